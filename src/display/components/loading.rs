/*
 *  display/components/loading.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Loading animation shown while the clock waits on the network
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::{Baseline, Text};

use crate::display::pens;

const DOTS: u8 = 5;
const DOT_PITCH: i32 = 3;
const DOT_SIZE: u32 = 2;
const DOT_Y: i32 = 5;

/// Label followed by a row of dots that fills one dot per step.
#[derive(Debug, Clone)]
pub struct Loading {
    origin: Point,
    text: String,
    text_width: i32,
    state: u8,
}

impl Loading {
    pub fn new(origin: Point, text: impl Into<String>) -> Self {
        let text = text.into();
        let text_width = (text.chars().count() as u32 * FONT_5X8.character_size.width) as i32;
        Self { origin, text, text_width, state: 0 }
    }

    /// Dots currently shown.
    pub fn state(&self) -> u8 {
        self.state
    }

    fn dot(&self, i: u8) -> Rectangle {
        Rectangle::new(
            self.origin + Point::new(self.text_width + i32::from(i) * DOT_PITCH, DOT_Y),
            Size::new(DOT_SIZE, DOT_SIZE),
        )
    }

    /// Draw the label; call once before stepping.
    pub fn draw_label<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let style = MonoTextStyle::new(&FONT_5X8, pens::YELLOW);
        Text::with_baseline(&self.text, self.origin, style, Baseline::Top).draw(target)?;
        Ok(())
    }

    /// Advance one frame: state 0 wipes the dots, then each step adds one.
    pub fn step<D>(&mut self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        if self.state == 0 {
            for i in 0..DOTS {
                target.fill_solid(&self.dot(i), pens::BLACK)?;
            }
        }
        for i in 0..self.state {
            target.fill_solid(&self.dot(i), pens::YELLOW)?;
        }
        self.state = (self.state + 1) % DOTS;
        Ok(())
    }

    /// Area covered by the dots.
    pub fn dots_area(&self) -> Rectangle {
        let first = self.dot(0);
        let width = (i32::from(DOTS - 1) * DOT_PITCH) as u32 + DOT_SIZE;
        Rectangle::new(first.top_left, Size::new(width, DOT_SIZE))
    }
}
