/*
 *  display/error.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error type for the display subsystem
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

use std::convert::Infallible;
use std::error::Error;
use std::fmt;

use crate::display::components::clock::DigitOverflow;

#[derive(Debug)]
pub enum DisplayError {
    /// Driver could not be brought up
    InitializationFailed(String),

    /// Invalid configuration
    InvalidConfiguration(String),

    /// Frame does not match the panel geometry
    BufferSizeMismatch { expected: (u32, u32), actual: (u32, u32) },

    /// Writing the frame out failed
    Io(std::io::Error),

    /// A clock field could not be split into two digits
    Digits(DigitOverflow),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InitializationFailed(msg) => write!(f, "Display initialization failed: {}", msg),
            DisplayError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            DisplayError::BufferSizeMismatch { expected, actual } => write!(
                f,
                "Frame size mismatch: panel is {}x{}, frame is {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            DisplayError::Io(err) => write!(f, "Display I/O error: {}", err),
            DisplayError::Digits(err) => write!(f, "{}", err),
            DisplayError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for DisplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DisplayError::Io(err) => Some(err),
            DisplayError::Digits(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::Io(err)
    }
}

impl From<DigitOverflow> for DisplayError {
    fn from(err: DigitOverflow) -> Self {
        DisplayError::Digits(err)
    }
}

impl From<Infallible> for DisplayError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}
