/*
 *  sync.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Clock sync - time source to corrected RTC
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

use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::clock::{corrected_epoch, Rtc};
use crate::iso8601::format_epoch;
use crate::timesource::{wait_for_time, TimeSource};
use crate::timezone::{ResolveError, TzOffsetInfo, TzResolver};
use crate::transport::{ConnectPolicy, Progress, Transport, TransportError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("time source: {0}")]
    Time(#[from] TransportError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Result of one successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockState {
    pub zone: String,
    pub tz: TzOffsetInfo,
    pub utc_epoch: i64,
    pub corrected_epoch: i64,
}

/// Sole writer of the RTC.
pub struct ClockSync<S, T> {
    source: Arc<S>,
    resolver: TzResolver<T>,
    policy: ConnectPolicy,
    rtc: Arc<Rtc>,
}

impl<S: TimeSource, T: Transport> ClockSync<S, T> {
    pub fn new(source: Arc<S>, resolver: TzResolver<T>, policy: ConnectPolicy, rtc: Arc<Rtc>) -> Self {
        Self { source, resolver, policy, rtc }
    }

    pub fn rtc(&self) -> &Arc<Rtc> {
        &self.rtc
    }

    /// Wait for a located time, resolve its zone, then set the RTC.
    pub async fn sync<P>(&self, progress: &mut P) -> Result<ClockState, SyncError>
    where
        P: Progress + Send + ?Sized,
    {
        let located = wait_for_time(self.source.as_ref(), &self.policy, progress).await?;
        info!("time source ready, zone {}", located.zone);

        let tz = self.resolver.resolve_with_progress(&located.zone, progress).await?;

        // the lookup may have waited on the link; read again
        let now = wait_for_time(self.source.as_ref(), &self.policy, progress).await?;
        let corrected = corrected_epoch(now.utc_epoch_seconds, &tz);
        self.rtc.set_epoch(corrected);
        info!(
            "RTC set to {} (UTC {}, offset {}s)",
            format_epoch(corrected),
            format_epoch(now.utc_epoch_seconds),
            tz.total_offset_seconds()
        );

        Ok(ClockState {
            zone: located.zone,
            tz,
            utc_epoch: now.utc_epoch_seconds,
            corrected_epoch: corrected,
        })
    }
}
