/*
 *  display/drivers/terminal.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Terminal driver - draws the matrix with ANSI 24-bit colour half blocks
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

use std::fmt::Write as _;
use std::io::Write;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use log::debug;

use crate::display::error::DisplayError;
use crate::display::framebuffer::FrameBuffer;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};

const CURSOR_HOME: &str = "\x1b[H";
const CLEAR_SCREEN: &str = "\x1b[2J";
const HIDE_CURSOR: &str = "\x1b[?25l";
const RESET: &str = "\x1b[0m";
const UPPER_HALF: char = '\u{2580}';

/// Two matrix rows per terminal line: upper pixel as foreground, lower as background.
pub struct TerminalDriver<W: Write + Send> {
    out: W,
    capabilities: DisplayCapabilities,
    brightness: f32,
}

impl TerminalDriver<std::io::Stdout> {
    pub fn stdout(width: u32, height: u32) -> Self {
        Self::new(std::io::stdout(), width, height)
    }
}

impl<W: Write + Send> TerminalDriver<W> {
    pub fn new(out: W, width: u32, height: u32) -> Self {
        Self {
            out,
            capabilities: DisplayCapabilities::matrix(width, height),
            brightness: 1.0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn scale(c: Rgb888, level: f32) -> (u8, u8, u8) {
    let s = |v: u8| (f32::from(v) * level).round().clamp(0.0, 255.0) as u8;
    (s(c.r()), s(c.g()), s(c.b()))
}

/// ANSI text for one frame, starting at the cursor home position.
pub fn render_frame(frame: &FrameBuffer, brightness: f32) -> String {
    let mut s = String::with_capacity((frame.width() * frame.height() * 20) as usize);
    s.push_str(CURSOR_HOME);
    let blank = vec![Rgb888::BLACK; frame.width() as usize];
    for y in (0..frame.height()).step_by(2) {
        let upper = frame.row(y).unwrap_or(blank.as_slice());
        let lower = frame.row(y + 1).unwrap_or(blank.as_slice());
        for (&u, &l) in upper.iter().zip(lower.iter()) {
            let (ur, ug, ub) = scale(u, brightness);
            let (lr, lg, lb) = scale(l, brightness);
            let _ = write!(s, "\x1b[38;2;{ur};{ug};{ub}m\x1b[48;2;{lr};{lg};{lb}m{UPPER_HALF}");
        }
        s.push_str(RESET);
        s.push('\n');
    }
    s
}

impl<W: Write + Send> DisplayDriver for TerminalDriver<W> {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        debug!("terminal display {}x{}", self.capabilities.width, self.capabilities.height);
        write!(self.out, "{CLEAR_SCREEN}{HIDE_CURSOR}")?;
        self.out.flush()?;
        Ok(())
    }

    fn set_brightness(&mut self, level: f32) -> Result<(), DisplayError> {
        if !(0.0..=1.0).contains(&level) {
            return Err(DisplayError::InvalidConfiguration(format!(
                "brightness {level} outside 0.0..=1.0"
            )));
        }
        self.brightness = level;
        Ok(())
    }

    fn update(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        self.check_frame(frame)?;
        self.out.write_all(render_frame(frame, self.brightness).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let (w, h) = self.dimensions();
        self.update(&FrameBuffer::new(w, h))
    }
}
