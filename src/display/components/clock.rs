/*
 *  display/components/clock.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Clock display component - compact 3x5 pairs or basic HH:MM:SS
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

use core::fmt::Write;

use arrayvec::ArrayString;
use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::RtcDateTime;
use crate::clock_font::{draw_char, TINY_HEIGHT};
use crate::display::error::DisplayError;
use crate::display::pens;

/// Compact face: three 7 px pairs and two 3 px dividers.
pub const COMPACT_WIDTH: u32 = 27;
const PAIR_ADVANCE: i32 = 7;
const DIVIDER_ADVANCE: i32 = 3;
const BASIC_CHARS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} does not fit in two decimal digits")]
pub struct DigitOverflow(pub u32);

/// Most and least significant decimal digit of a clock field.
pub fn split_digits(n: u32) -> Result<(u8, u8), DigitOverflow> {
    if n > 99 {
        return Err(DigitOverflow(n));
    }
    Ok(((n / 10) as u8, (n % 10) as u8))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClockStyle {
    #[default]
    Compact,
    Basic,
}

/// Clock display state
#[derive(Debug, Clone, Default)]
pub struct ClockState {
    /// Last time drawn (h, m, s)
    pub last_drawn: Option<(u32, u32, u32)>,
}

/// Clock display component
#[derive(Debug, Clone)]
pub struct ClockDisplay {
    style: ClockStyle,
    origin: Point,
    state: ClockState,
}

impl ClockDisplay {
    pub fn new(style: ClockStyle) -> Self {
        Self {
            style,
            origin: Point::zero(),
            state: ClockState::default(),
        }
    }

    pub fn style(&self) -> ClockStyle {
        self.style
    }

    /// Area this face occupies on the panel.
    pub fn bounds(&self) -> Rectangle {
        let size = match self.style {
            ClockStyle::Compact => Size::new(COMPACT_WIDTH, TINY_HEIGHT),
            ClockStyle::Basic => Size::new(
                BASIC_CHARS * FONT_5X8.character_size.width,
                FONT_5X8.character_size.height,
            ),
        };
        Rectangle::new(self.origin, size)
    }

    /// True when `now` shows a different time than the last render.
    pub fn has_changed(&self, now: &RtcDateTime) -> bool {
        self.state.last_drawn != Some((now.hour, now.minute, now.second))
    }

    /// Forget the last render so the next one always draws.
    pub fn invalidate(&mut self) {
        self.state.last_drawn = None;
    }

    /// Draw `now`; returns false when nothing changed since the last call.
    pub fn render<D>(&mut self, target: &mut D, now: &RtcDateTime) -> Result<bool, DisplayError>
    where
        D: DrawTarget<Color = Rgb888>,
        DisplayError: From<D::Error>,
    {
        if !self.has_changed(now) {
            return Ok(false);
        }
        match self.style {
            ClockStyle::Compact => self.draw_compact(target, now.hour, now.minute, now.second)?,
            ClockStyle::Basic => self.draw_basic(target, now.hour, now.minute, now.second)?,
        }
        self.state.last_drawn = Some((now.hour, now.minute, now.second));
        Ok(true)
    }

    fn draw_compact<D>(&self, target: &mut D, hour: u32, minute: u32, second: u32) -> Result<(), DisplayError>
    where
        D: DrawTarget<Color = Rgb888>,
        DisplayError: From<D::Error>,
    {
        // split first so an overflow leaves the old digits on screen
        let pairs = [split_digits(hour)?, split_digits(minute)?, split_digits(second)?];

        self.bounds()
            .into_styled(PrimitiveStyle::with_fill(pens::BLACK))
            .draw(target)?;

        let y = self.origin.y;
        let mut x = self.origin.x;
        for (i, (msd, lsd)) in pairs.into_iter().enumerate() {
            draw_char(target, char::from(b'0' + msd), Point::new(x, y), pens::YELLOW)?;
            draw_char(target, char::from(b'0' + lsd), Point::new(x + 4, y), pens::YELLOW)?;
            x += PAIR_ADVANCE;
            if i < 2 {
                draw_divider(target, Point::new(x, y))?;
                x += DIVIDER_ADVANCE;
            }
        }
        Ok(())
    }

    fn draw_basic<D>(&self, target: &mut D, hour: u32, minute: u32, second: u32) -> Result<(), DisplayError>
    where
        D: DrawTarget<Color = Rgb888>,
        DisplayError: From<D::Error>,
    {
        for field in [hour, minute, second] {
            split_digits(field)?;
        }
        self.bounds()
            .into_styled(PrimitiveStyle::with_fill(pens::BLACK))
            .draw(target)?;

        // fields are two digits at most, checked above
        let mut text = ArrayString::<8>::new();
        let _ = write!(&mut text, "{:02}:{:02}:{:02}", hour, minute, second);
        let style = MonoTextStyle::new(&FONT_5X8, pens::WHITE);
        Text::with_baseline(&text, self.origin, style, Baseline::Top).draw(target)?;
        Ok(())
    }
}

// two dots, one column in from the pair
fn draw_divider<D>(target: &mut D, at: Point) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    target.draw_iter([
        Pixel(at + Point::new(1, 1), pens::YELLOW),
        Pixel(at + Point::new(1, 3), pens::YELLOW),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::framebuffer::FrameBuffer;
    use crate::display::traits::{MATRIX_HEIGHT, MATRIX_WIDTH};

    fn at(hour: u32, minute: u32, second: u32) -> RtcDateTime {
        RtcDateTime { hour, minute, second, ..Default::default() }
    }

    #[test]
    fn test_split_digits() {
        assert_eq!(split_digits(0), Ok((0, 0)));
        assert_eq!(split_digits(7), Ok((0, 7)));
        assert_eq!(split_digits(59), Ok((5, 9)));
        assert_eq!(split_digits(99), Ok((9, 9)));
        assert_eq!(split_digits(100), Err(DigitOverflow(100)));
    }

    #[test]
    fn test_compact_layout() {
        let mut fb = FrameBuffer::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let mut face = ClockDisplay::new(ClockStyle::Compact);
        assert!(face.render(&mut fb, &at(8, 8, 8)).unwrap());

        // 8 lights 13 of 15 pixels, six digits plus four divider dots
        assert_eq!(fb.lit_pixels(), 6 * 13 + 4);
        assert_eq!(fb.lit_in(&face.bounds()), fb.lit_pixels());
        // first divider at x = 7 + 1
        assert_eq!(fb.pixel(8, 1), Some(pens::YELLOW));
        assert_eq!(fb.pixel(8, 3), Some(pens::YELLOW));
        assert_eq!(fb.pixel(8, 2), Some(pens::BLACK));
        // seconds pair starts at x = 20
        assert_eq!(fb.pixel(20, 0), Some(pens::YELLOW));
        assert_eq!(fb.pixel(26, 4), Some(pens::YELLOW));
    }

    #[test]
    fn test_render_skips_unchanged_second() {
        let mut fb = FrameBuffer::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let mut face = ClockDisplay::new(ClockStyle::Compact);
        assert!(face.render(&mut fb, &at(12, 0, 1)).unwrap());
        assert!(!face.render(&mut fb, &at(12, 0, 1)).unwrap());
        assert!(face.render(&mut fb, &at(12, 0, 2)).unwrap());
        face.invalidate();
        assert!(face.render(&mut fb, &at(12, 0, 2)).unwrap());
    }

    #[test]
    fn test_redraw_clears_old_digits() {
        let mut fb = FrameBuffer::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let mut face = ClockDisplay::new(ClockStyle::Compact);
        face.render(&mut fb, &at(8, 8, 8)).unwrap();
        face.render(&mut fb, &at(11, 11, 11)).unwrap();
        // "1" lights 8 pixels
        assert_eq!(fb.lit_pixels(), 6 * 8 + 4);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut fb = FrameBuffer::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let mut face = ClockDisplay::new(ClockStyle::Compact);
        let err = face.render(&mut fb, &at(100, 0, 0)).unwrap_err();
        assert!(matches!(err, DisplayError::Digits(DigitOverflow(100))));
        assert_eq!(fb.lit_pixels(), 0);
    }

    #[test]
    fn test_basic_style_draws_white_text() {
        let mut fb = FrameBuffer::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let mut face = ClockDisplay::new(ClockStyle::Basic);
        face.render(&mut fb, &at(23, 59, 58)).unwrap();
        assert_eq!(face.bounds().size, Size::new(40, 8));
        assert!(fb.lit_pixels() > 0);
        assert_eq!(fb.lit_in(&face.bounds()), fb.lit_pixels());
        assert!(fb.as_slice().iter().all(|&c| c == pens::BLACK || c == pens::WHITE));
    }
}
