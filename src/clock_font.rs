/*
 *  clock_font.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  3x5 pixel font for clock digits and temperature
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

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

pub const TINY_WIDTH: u32 = 3;
pub const TINY_HEIGHT: u32 = 5;
/// glyph width plus one column of spacing
pub const TINY_ADVANCE: i32 = 4;

// each row uses the low three bits, 0b100 is the left column
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b111, 0b001, 0b111, 0b100, 0b111], // 2
    [0b111, 0b001, 0b011, 0b001, 0b111], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b111, 0b001, 0b111], // 5
    [0b111, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b010, 0b010, 0b010], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b111], // 9
];

const MINUS: [u8; 5] = [0b000, 0b000, 0b111, 0b000, 0b000];
const COLON: [u8; 5] = [0b000, 0b010, 0b000, 0b010, 0b000];
const LOWER_C: [u8; 5] = [0b000, 0b111, 0b100, 0b100, 0b111];
const LOWER_F: [u8; 5] = [0b011, 0b100, 0b110, 0b100, 0b100];
const UPPER_C: [u8; 5] = [0b111, 0b100, 0b100, 0b100, 0b111];
const UPPER_F: [u8; 5] = [0b111, 0b100, 0b110, 0b100, 0b100];
const DEGREE: [u8; 5] = [0b010, 0b101, 0b010, 0b000, 0b000];
const BLANK: [u8; 5] = [0; 5];

pub fn glyph(ch: char) -> Option<&'static [u8; 5]> {
    match ch {
        '0'..='9' => DIGITS.get(ch as usize - '0' as usize),
        '-' => Some(&MINUS),
        ':' => Some(&COLON),
        'c' => Some(&LOWER_C),
        'f' => Some(&LOWER_F),
        'C' => Some(&UPPER_C),
        'F' => Some(&UPPER_F),
        '°' => Some(&DEGREE),
        ' ' => Some(&BLANK),
        _ => None,
    }
}

/// Width in pixels of `text` drawn with [`draw_text`].
pub fn measure(text: &str) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 { 0 } else { n * TINY_ADVANCE as u32 - 1 }
}

pub fn draw_char<D>(target: &mut D, ch: char, origin: Point, color: Rgb888) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    // unsupported characters leave a gap
    let Some(rows) = glyph(ch) else { return Ok(()) };
    let pixels = rows.iter().enumerate().flat_map(move |(y, row)| {
        (0..TINY_WIDTH as i32).filter_map(move |x| {
            let lit = row & (0b100 >> x) != 0;
            lit.then(|| Pixel(origin + Point::new(x, y as i32), color))
        })
    });
    target.draw_iter(pixels)
}

/// Draw left to right; returns the x just past the last glyph.
pub fn draw_text<D>(target: &mut D, text: &str, origin: Point, color: Rgb888) -> Result<i32, D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let mut x = origin.x;
    for ch in text.chars() {
        draw_char(target, ch, Point::new(x, origin.y), color)?;
        x += TINY_ADVANCE;
    }
    Ok(x)
}
