/*
 *  display/framebuffer.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  RGB framebuffer sized at runtime for the LED matrix
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

use core::convert::Infallible;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// Row-major RGB pixels; everything draws here before a driver update.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    buf: Vec<Rgb888>,
    w: usize,
    h: usize,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![Rgb888::BLACK; w * h], w, h }
    }

    pub fn width(&self) -> u32 { self.w as u32 }
    pub fn height(&self) -> u32 { self.h as u32 }

    pub fn as_slice(&self) -> &[Rgb888] { &self.buf }

    /// One row of pixels, top row is 0.
    pub fn row(&self, y: u32) -> Option<&[Rgb888]> {
        let y = y as usize;
        (y < self.h).then(|| &self.buf[y * self.w..(y + 1) * self.w])
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        self.idx(Point::new(x as i32, y as i32)).map(|i| self.buf[i])
    }

    /// Count of non-black pixels.
    pub fn lit_pixels(&self) -> usize {
        self.buf.iter().filter(|&&c| c != Rgb888::BLACK).count()
    }

    /// Lit pixels inside `area`, clipped to the buffer.
    pub fn lit_in(&self, area: &Rectangle) -> usize {
        area.points()
            .filter_map(|p| self.idx(p))
            .filter(|&i| self.buf[i] != Rgb888::BLACK)
            .count()
    }

    pub fn fill_area(&mut self, area: &Rectangle, color: Rgb888) {
        for p in area.points() {
            if let Some(i) = self.idx(p) {
                self.buf[i] = color;
            }
        }
    }

    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        self.fill_area(area, color);
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }
}
