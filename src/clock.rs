/*
 *  clock.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Epoch correction and the real-time clock register
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

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Datelike, Timelike};
use tokio::time::Instant;

use crate::timezone::TzOffsetInfo;

/// Wall-clock epoch for `utc_epoch`: standing offset, plus the DST delta
/// when DST is currently active. The transition epoch is not consulted.
pub fn corrected_epoch(utc_epoch: i64, tz: &TzOffsetInfo) -> i64 {
    let mut epoch = utc_epoch + tz.standard_offset_seconds;
    if let Some(dst) = tz.dst {
        if dst.active {
            epoch += dst.offset_seconds;
        }
    }
    epoch
}

/// Calendar fields as read back from the RTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// 0 = Monday
    pub weekday: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl RtcDateTime {
    pub fn from_epoch(epoch: i64) -> Self {
        let dt = DateTime::from_timestamp(epoch, 0).unwrap_or_default();
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            weekday: dt.weekday().num_days_from_monday(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        }
    }
}

/// Real-time clock register holding corrected wall-clock time.
///
/// Free-runs from a monotonic origin. A single writer (clock sync) sets it;
/// any number of readers take lock-free snapshots.
#[derive(Debug)]
pub struct Rtc {
    origin: Instant,
    base_ms: AtomicI64,
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

impl Rtc {
    /// Starts at epoch 0 until set.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            base_ms: AtomicI64::new(0),
        }
    }

    fn elapsed_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }

    pub fn set_epoch(&self, epoch: i64) {
        self.base_ms.store(epoch * 1000 - self.elapsed_ms(), Ordering::Release);
    }

    pub fn epoch_ms(&self) -> i64 {
        self.base_ms.load(Ordering::Acquire) + self.elapsed_ms()
    }

    pub fn epoch(&self) -> i64 {
        self.epoch_ms().div_euclid(1000)
    }

    pub fn datetime(&self) -> RtcDateTime {
        RtcDateTime::from_epoch(self.epoch())
    }
}
