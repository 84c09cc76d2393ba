/*
 *  timezone.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Timezone resolver - coarse zone hint to standing offset and DST data
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

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::iso8601::{format_epoch, parse_iso8601_to_epoch, InvalidTimestampError};
use crate::transport::{web_request, ConnectPolicy, Progress, Transport, TransportError, ROUTE_TIME};

/// Zone reported before the network has located the device.
pub const UNKNOWN_ZONE: &str = "UTC,Unknown";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("timezone service unreachable: {0}")]
    Unreachable(#[from] TransportError),
    #[error("zone hint {0:?} is not <country>,<region>")]
    InvalidHint(String),
    #[error("malformed timezone response: {0}")]
    Malformed(String),
}

/// Outcome of a failed resolve; timestamp failures stay distinguishable.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    InvalidTimestamp(#[from] InvalidTimestampError),
}

/// Coarse `"<country>,<region>"` hint from network registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneHint {
    pub country: String,
    pub region: String,
}

impl FromStr for ZoneHint {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        let country = parts.next().unwrap_or_default().trim();
        let region = parts.next().map(str::trim).unwrap_or_default();
        if region.is_empty() {
            return Err(LookupError::InvalidHint(s.to_string()));
        }
        Ok(Self {
            country: country.to_string(),
            region: region.to_string(),
        })
    }
}

impl fmt::Display for ZoneHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.country, self.region)
    }
}

/// DST facts for a zone that observes daylight saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstInfo {
    /// Seconds added on top of the standing offset while DST is in force.
    pub offset_seconds: i64,
    /// UTC epoch of the next boundary: DST end when active, DST start otherwise.
    pub transition_epoch: i64,
    pub active: bool,
}

/// Standing offset plus optional DST data; DST fields exist iff the zone has DST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TzOffsetInfo {
    pub standard_offset_seconds: i64,
    pub dst: Option<DstInfo>,
}

impl TzOffsetInfo {
    pub fn fixed(standard_offset_seconds: i64) -> Self {
        Self { standard_offset_seconds, dst: None }
    }

    pub fn has_dst(&self) -> bool {
        self.dst.is_some()
    }

    pub fn dst_active(&self) -> bool {
        self.dst.is_some_and(|d| d.active)
    }

    pub fn dst_offset_seconds(&self) -> Option<i64> {
        self.dst.map(|d| d.offset_seconds)
    }

    pub fn dst_transition_epoch(&self) -> Option<i64> {
        self.dst.map(|d| d.transition_epoch)
    }

    /// Total seconds east of UTC currently applied to wall-clock time.
    pub fn total_offset_seconds(&self) -> i64 {
        self.standard_offset_seconds
            + match self.dst {
                Some(d) if d.active => d.offset_seconds,
                _ => 0,
            }
    }
}

impl fmt::Display for TzOffsetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UTC{:+}s", self.standard_offset_seconds)?;
        if let Some(d) = self.dst {
            write!(
                f,
                " dst {:+}s {} (next change {})",
                d.offset_seconds,
                if d.active { "active" } else { "inactive" },
                format_epoch(d.transition_epoch)
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Seconds {
    seconds: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DstInterval {
    dst_offset_to_standard_time: Option<Seconds>,
    dst_start: Option<String>,
    dst_end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeZoneResponse {
    #[serde(default)]
    has_day_light_saving: bool,
    standard_utc_offset: Seconds,
    #[serde(default)]
    is_day_light_saving_active: bool,
    dst_interval: Option<DstInterval>,
}

/// Build [`TzOffsetInfo`] from a timezone service body.
pub fn tz_info_from_body(body: &Value) -> Result<TzOffsetInfo, ResolveError> {
    let resp = TimeZoneResponse::deserialize(body)
        .map_err(|e| LookupError::Malformed(e.to_string()))?;

    let dst = if resp.has_day_light_saving {
        let interval = resp
            .dst_interval
            .ok_or_else(|| LookupError::Malformed("hasDayLightSaving without dstInterval".into()))?;
        let offset = interval
            .dst_offset_to_standard_time
            .ok_or_else(|| LookupError::Malformed("dstInterval without dstOffsetToStandardTime".into()))?;
        let active = resp.is_day_light_saving_active;
        let boundary = if active { interval.dst_end } else { interval.dst_start };
        let boundary = boundary.ok_or_else(|| {
            LookupError::Malformed(format!("missing {}", if active { "dstEnd" } else { "dstStart" }))
        })?;
        Some(DstInfo {
            offset_seconds: offset.seconds,
            transition_epoch: parse_iso8601_to_epoch(&boundary)?,
            active,
        })
    } else {
        None
    };

    Ok(TzOffsetInfo {
        standard_offset_seconds: resp.standard_utc_offset.seconds,
        dst,
    })
}

/// Resolves zone hints through the `time` route of a [`Transport`].
#[derive(Debug)]
pub struct TzResolver<T> {
    transport: Arc<T>,
    policy: ConnectPolicy,
}

impl<T: Transport> TzResolver<T> {
    pub fn new(transport: Arc<T>, policy: ConnectPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn resolve(&self, zone: &str) -> Result<TzOffsetInfo, ResolveError> {
        self.resolve_with_progress(zone, &mut ()).await
    }

    pub async fn resolve_with_progress<P>(&self, zone: &str, progress: &mut P) -> Result<TzOffsetInfo, ResolveError>
    where
        P: Progress + Send + ?Sized,
    {
        let hint: ZoneHint = zone.parse()?;
        let path = format!("/TimeZone/zone?timeZone={}", hint.region);
        debug!("resolving {} via {}", hint, path);

        let body = web_request(self.transport.as_ref(), &self.policy, ROUTE_TIME, &path, progress)
            .await
            .map_err(LookupError::from)?;
        let info = tz_info_from_body(&body)?;
        info!("zone {} resolved: {}", hint.region, info);
        Ok(info)
    }
}
