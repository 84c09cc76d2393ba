/*
 *  display/traits.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for display driver abstraction
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

use crate::display::error::DisplayError;
use crate::display::framebuffer::FrameBuffer;

/// Galactic Unicorn panel geometry
pub const MATRIX_WIDTH: u32 = 53;
pub const MATRIX_HEIGHT: u32 = 11;

/// Display capabilities and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCapabilities {
    /// Display width in pixels
    pub width: u32,

    /// Display height in pixels
    pub height: u32,

    /// Maximum recommended frame rate
    pub max_fps: u32,

    /// Whether the display supports brightness control
    pub supports_brightness: bool,
}

impl DisplayCapabilities {
    pub fn matrix(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            max_fps: 10,
            supports_brightness: true,
        }
    }
}

/// Minimal hardware abstraction for an RGB matrix.
///
/// Drawing always happens in a [`FrameBuffer`]; the driver only receives
/// finished frames through [`DisplayDriver::update`].
pub trait DisplayDriver: Send {
    /// Returns the capabilities of this display
    fn capabilities(&self) -> &DisplayCapabilities;

    /// Returns the display dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Prepare the panel for frames
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Global brightness, 0.0 (off) to 1.0 (full)
    fn set_brightness(&mut self, level: f32) -> Result<(), DisplayError>;

    /// Push a complete frame to the panel
    fn update(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError>;

    /// Blank the panel without touching any framebuffer
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Reject frames that do not match the panel
    fn check_frame(&self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        let expected = self.dimensions();
        let actual = (frame.width(), frame.height());
        if expected != actual {
            return Err(DisplayError::BufferSizeMismatch { expected, actual });
        }
        Ok(())
    }
}

pub type BoxedDriver = Box<dyn DisplayDriver>;
