/*
 *  lib.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Library root, shared by the binary and the integration tests
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

pub mod boot;
pub mod clock;
pub mod clock_font;
pub mod config;
pub mod display;
pub mod geoloc;
pub mod iso8601;
pub mod runtime;
pub mod sync;
pub mod timesource;
pub mod timezone;
pub mod transport;
pub mod weather;
pub mod weather_glyph;
