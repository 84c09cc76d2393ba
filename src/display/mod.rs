/*
 *  display/mod.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - framebuffer, drivers, components and manager
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod framebuffer;

// Display drivers
pub mod drivers;

// Display manager
pub mod manager;

// UI components
pub mod components;

// Re-exports for convenience
pub use traits::{BoxedDriver, DisplayCapabilities, DisplayDriver, MATRIX_HEIGHT, MATRIX_WIDTH};
pub use error::DisplayError;
pub use framebuffer::FrameBuffer;
pub use manager::{DisplayManager, LoadingProgress};
pub use components::ClockStyle;

/// Fixed pens, the panel has no palette.
pub mod pens {
    use embedded_graphics::pixelcolor::Rgb888;

    pub const WHITE: Rgb888 = Rgb888::new(255, 255, 255);
    pub const BLACK: Rgb888 = Rgb888::new(0, 0, 0);
    pub const BLUE: Rgb888 = Rgb888::new(0, 0, 255);
    pub const YELLOW: Rgb888 = Rgb888::new(255, 255, 0);
}
