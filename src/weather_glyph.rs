/*
 *  weather_glyph.rs
 *
 *  cellclock - connected LED matrix clock
 *	(c) 2020-26 Stuart Hunter
 *
 *	11x11 colour weather glyphs and the WMO code mapping
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

pub const GLYPH_WIDTH: u32 = 11;
pub const GLYPH_HEIGHT: u32 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherGlyph {
    Sun,
    Overcast,
    Fog,
    Rain,
    Snow,
    Lightning,
}

impl WeatherGlyph {
    /// WMO weather interpretation code to glyph; `None` for codes we have no art for.
    pub fn from_wmo_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Sun),
            1..=3 => Some(Self::Overcast),
            45 | 46 | 48 => Some(Self::Fog),
            51..=57 | 61..=67 | 80..=82 => Some(Self::Rain),
            71 | 73 | 75 | 77 | 85 | 86 => Some(Self::Snow),
            95 | 96 | 99 => Some(Self::Lightning),
            _ => None,
        }
    }

    fn rows(self) -> &'static [&'static str; GLYPH_HEIGHT as usize] {
        match self {
            Self::Sun => &SUN,
            Self::Overcast => &OVERCAST,
            Self::Fog => &FOG,
            Self::Rain => &RAIN,
            Self::Snow => &SNOW,
            Self::Lightning => &LIGHTNING,
        }
    }

    /// Lit pixels of the glyph, offset to `origin`.
    pub fn pixels(self, origin: Point) -> impl Iterator<Item = Pixel<Rgb888>> {
        self.rows().iter().enumerate().flat_map(move |(y, row)| {
            row.bytes().enumerate().filter_map(move |(x, b)| {
                palette(b).map(|c| Pixel(origin + Point::new(x as i32, y as i32), c))
            })
        })
    }

    pub fn draw<D>(self, target: &mut D, origin: Point) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        target.draw_iter(self.pixels(origin))
    }
}

// '.' is transparent
fn palette(b: u8) -> Option<Rgb888> {
    match b {
        b'y' => Some(Rgb888::new(255, 200, 0)),
        b'o' => Some(Rgb888::new(255, 120, 0)),
        b'w' => Some(Rgb888::new(200, 200, 200)),
        b'g' => Some(Rgb888::new(90, 90, 90)),
        b'b' => Some(Rgb888::new(0, 90, 255)),
        b'c' => Some(Rgb888::new(140, 220, 255)),
        _ => None,
    }
}

const SUN: [&str; 11] = [
    ".....y.....",
    ".y...y...y.",
    "..y.....y..",
    "....ooo....",
    "...ooooo...",
    "yy.ooooo.yy",
    "...ooooo...",
    "....ooo....",
    "..y.....y..",
    ".y...y...y.",
    ".....y.....",
];

const OVERCAST: [&str; 11] = [
    "...........",
    "...........",
    "....www....",
    "...wwwww...",
    ".www.wwwww.",
    "wwwwwwwwwww",
    "wwwwwwwwwww",
    ".wwwwwwwww.",
    "...........",
    "...........",
    "...........",
];

const FOG: [&str; 11] = [
    "...........",
    ".ggggggggg.",
    "...........",
    "gggggggggg.",
    "...........",
    ".ggggggggg.",
    "...........",
    "gggggggggg.",
    "...........",
    ".ggggggggg.",
    "...........",
];

const RAIN: [&str; 11] = [
    "....www....",
    "...wwwww...",
    ".www.wwwww.",
    "wwwwwwwwwww",
    ".wwwwwwwww.",
    "...........",
    ".b..b..b...",
    "b..b..b..b.",
    "...........",
    "..b..b..b..",
    ".b..b..b...",
];

const SNOW: [&str; 11] = [
    "....www....",
    "...wwwww...",
    ".www.wwwww.",
    "wwwwwwwwwww",
    ".wwwwwwwww.",
    "...........",
    ".c...c...c.",
    "ccc.ccc.ccc",
    ".c...c...c.",
    "...........",
    "...c...c...",
];

const LIGHTNING: [&str; 11] = [
    "....ggg....",
    "...ggggg...",
    ".ggg.ggggg.",
    "ggggggggggg",
    ".ggggyyggg.",
    "....yy.....",
    "...yyyy....",
    ".....yy....",
    "....yy.....",
    "...yy......",
    "...y.......",
];
