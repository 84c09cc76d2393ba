/*
 *  display/drivers/mock.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock display driver for testing and headless runs
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

use std::sync::{Arc, Mutex, MutexGuard};

use crate::display::error::DisplayError;
use crate::display::framebuffer::FrameBuffer;
use crate::display::traits::{DisplayCapabilities, DisplayDriver};

/// Records every operation and keeps the last frame it was given.
///
/// State lives behind an `Arc<Mutex<_>>` so a test can keep a handle after
/// the driver has been boxed and moved into the render loop.
#[derive(Debug, Clone)]
pub struct MockDriver {
    capabilities: DisplayCapabilities,
    state: Arc<Mutex<MockDriverState>>,
}

/// Internal state for the mock driver (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockDriverState {
    /// Number of times init() was called
    pub init_count: usize,

    /// Number of frames pushed via update()
    pub update_count: usize,

    /// Number of times clear() was called
    pub clear_count: usize,

    /// Last brightness value set
    pub last_brightness: Option<f32>,

    /// Whether the driver is initialized
    pub is_initialized: bool,

    /// Copy of the most recent frame
    pub last_frame: Option<FrameBuffer>,

    /// Simulate failures (for error testing)
    pub simulate_update_failure: bool,
    pub simulate_init_failure: bool,
}

impl MockDriver {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            capabilities: DisplayCapabilities::matrix(width, height),
            state: Arc::new(Mutex::new(MockDriverState::default())),
        }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockDriverState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockDriverState>, DisplayError> {
        self.state
            .lock()
            .map_err(|_| DisplayError::Other("mock driver state poisoned".to_string()))
    }
}

impl DisplayDriver for MockDriver {
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        if state.simulate_init_failure {
            return Err(DisplayError::InitializationFailed("Simulated init failure".to_string()));
        }
        state.init_count += 1;
        state.is_initialized = true;
        Ok(())
    }

    fn set_brightness(&mut self, level: f32) -> Result<(), DisplayError> {
        self.lock()?.last_brightness = Some(level);
        Ok(())
    }

    fn update(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        self.check_frame(frame)?;
        let mut state = self.lock()?;
        if state.simulate_update_failure {
            return Err(DisplayError::Other("Simulated update failure".to_string()));
        }
        state.update_count += 1;
        state.last_frame = Some(frame.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        state.clear_count += 1;
        state.last_frame = Some(FrameBuffer::new(self.capabilities.width, self.capabilities.height));
        Ok(())
    }
}
