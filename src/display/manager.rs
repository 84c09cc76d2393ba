/*
 *  display/manager.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display manager - owns the driver, framebuffer and components
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

use std::time::Instant;

use embedded_graphics::prelude::*;
use log::{debug, info, warn};

use crate::clock::RtcDateTime;
use crate::display::components::{ClockDisplay, ClockStyle, Loading, WeatherDisplay};
use crate::display::{BoxedDriver, DisplayCapabilities, DisplayDriver, DisplayError, FrameBuffer};
use crate::transport::Progress;
use crate::weather::{TemperatureUnit, WeatherSnapshot};

pub const LOADING_TEXT: &str = "Loading";

/// Transfer timing for frames pushed to the driver
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    /// Time spent in the last driver update
    pub transfer_time_us: u64,

    /// Frames pushed so far
    pub frame_count: u64,

    /// Running average of transfer time
    pub avg_transfer_time_us: u64,
}

impl PerformanceMetrics {
    pub fn record_frame(&mut self, transfer_time_us: u64) {
        self.transfer_time_us = transfer_time_us;
        self.frame_count += 1;

        // Simple moving average (last frame + current) / 2
        if self.avg_transfer_time_us == 0 {
            self.avg_transfer_time_us = transfer_time_us;
        } else {
            self.avg_transfer_time_us = (self.avg_transfer_time_us + transfer_time_us) / 2;
        }
    }
}

/// Display manager that orchestrates all display operations
///
/// Not `Sync`: it owns a mutable driver and belongs to the single render
/// task. Clock and weather data reach it over watch channels.
pub struct DisplayManager {
    /// Display driver (trait object)
    driver: BoxedDriver,

    /// Framebuffer for rendering
    framebuffer: FrameBuffer,

    /// Display capabilities
    capabilities: DisplayCapabilities,

    /// Clock display component
    clock_display: ClockDisplay,

    /// Weather display component
    weather_display: WeatherDisplay,

    /// Boot animation, present while loading
    loading: Option<Loading>,

    /// Framebuffer differs from what the driver last got
    dirty: bool,

    /// Transfer metrics
    pub metrics: PerformanceMetrics,
}

impl DisplayManager {
    /// Wrap an uninitialised driver; brings it up and sets brightness.
    pub fn new_with_driver(
        mut driver: BoxedDriver,
        style: ClockStyle,
        units: TemperatureUnit,
        brightness: f32,
    ) -> Result<Self, DisplayError> {
        driver.init()?;
        let capabilities = driver.capabilities().clone();
        if capabilities.supports_brightness {
            driver.set_brightness(brightness)?;
        }
        info!(
            "Display: {}x{}, clock style {:?}, brightness {:.2}",
            capabilities.width, capabilities.height, style, brightness
        );

        Ok(Self {
            framebuffer: FrameBuffer::new(capabilities.width, capabilities.height),
            clock_display: ClockDisplay::new(style),
            weather_display: WeatherDisplay::new(capabilities.width, units),
            capabilities,
            driver,
            loading: None,
            dirty: false,
            metrics: PerformanceMetrics::default(),
        })
    }

    pub fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Blank the panel and forget what components last drew.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.framebuffer.clear(crate::display::pens::BLACK)?;
        self.clock_display.invalidate();
        self.driver.clear()?;
        self.dirty = false;
        Ok(())
    }

    /// Draw the label and begin the dot animation.
    pub fn start_loading(&mut self) -> Result<(), DisplayError> {
        let loading = Loading::new(Point::zero(), LOADING_TEXT);
        loading.draw_label(&mut self.framebuffer)?;
        self.loading = Some(loading);
        self.dirty = true;
        Ok(())
    }

    /// One animation frame, pushed straight to the panel.
    pub fn step_loading(&mut self) -> Result<(), DisplayError> {
        if let Some(loading) = self.loading.as_mut() {
            loading.step(&mut self.framebuffer)?;
            self.dirty = true;
        }
        self.flush().map(|_| ())
    }

    pub fn stop_loading(&mut self) {
        self.loading = None;
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// Redraw the clock if the displayed second changed.
    pub fn draw_clock(&mut self, now: &RtcDateTime) -> Result<bool, DisplayError> {
        let drawn = self.clock_display.render(&mut self.framebuffer, now)?;
        if drawn && self.clock_covers_temperature() {
            // the clock blanks its whole box, put the temperature back on top
            self.weather_display.draw_temperature(&mut self.framebuffer)?;
        }
        self.dirty |= drawn;
        Ok(drawn)
    }

    fn clock_covers_temperature(&self) -> bool {
        !self
            .clock_display
            .bounds()
            .intersection(&self.weather_display.temperature_area())
            .is_zero_sized()
    }

    /// Take a new weather snapshot, redrawing only when it changed.
    pub fn set_weather(&mut self, snapshot: WeatherSnapshot) -> Result<bool, DisplayError> {
        if !self.weather_display.update(snapshot) {
            debug!("weather unchanged, not redrawn");
            return Ok(false);
        }
        self.redraw_weather()?;
        Ok(true)
    }

    /// Draw the current snapshot, e.g. after a clear.
    pub fn redraw_weather(&mut self) -> Result<(), DisplayError> {
        self.weather_display.render(&mut self.framebuffer)?;
        self.dirty = true;
        Ok(())
    }

    /// Push the framebuffer if it changed; true when a frame went out.
    pub fn flush(&mut self) -> Result<bool, DisplayError> {
        if !self.dirty {
            return Ok(false);
        }
        let start = Instant::now();
        self.driver.update(&self.framebuffer)?;
        self.metrics.record_frame(start.elapsed().as_micros() as u64);
        self.dirty = false;
        Ok(true)
    }
}

/// Animates the loading dots on every connectivity poll.
pub struct LoadingProgress<'a> {
    display: &'a mut DisplayManager,
}

impl<'a> LoadingProgress<'a> {
    pub fn new(display: &'a mut DisplayManager) -> Self {
        Self { display }
    }
}

impl Progress for LoadingProgress<'_> {
    fn tick(&mut self) {
        if let Err(e) = self.display.step_loading() {
            warn!("loading animation: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::MockDriver;
    use crate::display::pens;
    use crate::display::traits::{MATRIX_HEIGHT, MATRIX_WIDTH};
    use embedded_graphics::primitives::Rectangle;

    fn manager() -> (DisplayManager, MockDriver) {
        manager_with(ClockStyle::Compact)
    }

    fn manager_with(style: ClockStyle) -> (DisplayManager, MockDriver) {
        let mock = MockDriver::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let handle = mock.clone();
        let dm = DisplayManager::new_with_driver(
            Box::new(mock),
            style,
            TemperatureUnit::Celsius,
            0.6,
        )
        .unwrap();
        (dm, handle)
    }

    #[test]
    fn test_new_initialises_driver() {
        let (_dm, mock) = manager();
        let state = mock.state();
        let state = state.lock().unwrap();
        assert_eq!(state.init_count, 1);
        assert_eq!(state.last_brightness, Some(0.6));
    }

    #[test]
    fn test_flush_only_when_dirty() {
        let (mut dm, mock) = manager();
        assert!(!dm.flush().unwrap());

        let now = RtcDateTime { hour: 9, minute: 30, second: 5, ..Default::default() };
        assert!(dm.draw_clock(&now).unwrap());
        assert!(dm.flush().unwrap());
        assert!(!dm.draw_clock(&now).unwrap());
        assert!(!dm.flush().unwrap());

        let state = mock.state();
        let state = state.lock().unwrap();
        assert_eq!(state.update_count, 1);
        assert_eq!(state.last_frame.as_ref(), Some(dm.framebuffer()));
        assert_eq!(dm.metrics.frame_count, 1);
    }

    #[test]
    fn test_loading_progress_steps_and_flushes() {
        let (mut dm, mock) = manager();
        dm.start_loading().unwrap();
        {
            let mut progress = LoadingProgress::new(&mut dm);
            for _ in 0..3 {
                progress.tick();
            }
        }
        assert_eq!(mock.state().lock().unwrap().update_count, 3);
        // two dots after three steps
        let dots = Loading::new(Point::zero(), LOADING_TEXT).dots_area();
        assert_eq!(dm.framebuffer().lit_in(&dots), 8);
        assert_eq!(dm.framebuffer().pixel(35, 5), Some(pens::YELLOW));
    }

    #[test]
    fn test_clear_forces_clock_redraw() {
        let (mut dm, mock) = manager();
        let now = RtcDateTime { hour: 1, minute: 2, second: 3, ..Default::default() };
        dm.draw_clock(&now).unwrap();
        dm.clear().unwrap();
        assert_eq!(dm.framebuffer().lit_pixels(), 0);
        assert_eq!(mock.state().lock().unwrap().clear_count, 1);
        assert!(dm.draw_clock(&now).unwrap());
    }

    #[test]
    fn test_weather_redrawn_only_on_change() {
        let (mut dm, _mock) = manager();
        let snap = WeatherSnapshot { code: 61, temperature_celsius: 9.0 };
        assert!(dm.set_weather(snap.clone()).unwrap());
        dm.flush().unwrap();
        assert!(!dm.set_weather(snap).unwrap());
        assert!(!dm.is_dirty());
    }

    #[test]
    fn test_driver_failure_surfaces() {
        let (mut dm, mock) = manager();
        mock.state().lock().unwrap().simulate_update_failure = true;
        dm.redraw_weather().unwrap();
        assert!(dm.flush().is_err());
        assert!(dm.is_dirty());
    }

    fn blue_in(dm: &DisplayManager, area: &Rectangle) -> usize {
        area.points()
            .filter(|p| dm.framebuffer().pixel(p.x as u32, p.y as u32) == Some(pens::BLUE))
            .count()
    }

    #[test]
    fn test_basic_clock_keeps_temperature_visible() {
        let (mut dm, _mock) = manager_with(ClockStyle::Basic);
        let area = dm.weather_display.temperature_area();
        assert!(dm.clock_covers_temperature());

        dm.set_weather(WeatherSnapshot { code: 0, temperature_celsius: 88.0 }).unwrap();
        let before = blue_in(&dm, &area);
        assert!(before > 0);

        for second in [58, 59] {
            let now = RtcDateTime { hour: 12, minute: 59, second, ..Default::default() };
            assert!(dm.draw_clock(&now).unwrap());
            assert_eq!(blue_in(&dm, &area), before);
        }
    }

    #[test]
    fn test_compact_clock_clear_of_temperature() {
        let (dm, _mock) = manager();
        assert!(!dm.clock_covers_temperature());
    }
}
