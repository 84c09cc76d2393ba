/*
 *  timesource.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Time source adapter - UTC epoch plus coarse zone hint
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

use std::future::Future;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::OnceCell;

use crate::geoloc::fetch_location;
use crate::timezone::UNKNOWN_ZONE;
use crate::transport::{poll_until, ConnectPolicy, Progress, TransportError};

/// One reading from the time source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeInfo {
    pub utc_epoch_seconds: i64,
    /// `"<country>,<region>"`
    pub zone: String,
}

impl TimeInfo {
    pub fn zone_known(&self) -> bool {
        !self.zone.is_empty() && self.zone != UNKNOWN_ZONE
    }
}

pub trait TimeSource: Send + Sync {
    /// `Ok(None)` while the source has no time yet.
    fn time(&self) -> impl Future<Output = Result<Option<TimeInfo>, TransportError>> + Send;
}

/// Block until the source reports a time with a known zone.
pub async fn wait_for_time<S, P>(source: &S, policy: &ConnectPolicy, progress: &mut P) -> Result<TimeInfo, TransportError>
where
    S: TimeSource + ?Sized,
    P: Progress + Send + ?Sized,
{
    poll_until(policy, progress, move || async move {
        match source.time().await {
            Ok(Some(info)) if info.zone_known() => Some(info),
            Ok(Some(info)) => {
                debug!("time available, zone not yet known ({})", info.zone);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("time source error: {}", e);
                None
            }
        }
    })
    .await
}

/// Host clock for UTC; zone from configuration or a one-off GeoIP lookup.
#[derive(Debug)]
pub struct HostTimeSource {
    configured_zone: Option<String>,
    geoip_url: String,
    geoip_zone: OnceCell<String>,
}

impl HostTimeSource {
    pub fn new(configured_zone: Option<String>, geoip_url: impl Into<String>) -> Self {
        Self {
            configured_zone,
            geoip_url: geoip_url.into(),
            geoip_zone: OnceCell::new(),
        }
    }

    async fn zone(&self) -> String {
        if let Some(zone) = &self.configured_zone {
            return zone.clone();
        }
        let looked_up = self
            .geoip_zone
            .get_or_try_init(|| async {
                let geo = fetch_location(&self.geoip_url).await.map_err(|e| e.to_string())?;
                let hint = geo.zone_hint().ok_or_else(|| "GeoIP reply has no timezone".to_string())?;
                info!("zone hint from GeoIP: {}", hint);
                Ok::<_, String>(hint)
            })
            .await;
        match looked_up {
            Ok(zone) => zone.clone(),
            Err(e) => {
                debug!("GeoIP zone lookup failed: {}", e);
                UNKNOWN_ZONE.to_string()
            }
        }
    }
}

impl TimeSource for HostTimeSource {
    async fn time(&self) -> Result<Option<TimeInfo>, TransportError> {
        let zone = self.zone().await;
        Ok(Some(TimeInfo {
            utc_epoch_seconds: Utc::now().timestamp(),
            zone,
        }))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Replays a script of readings; the last one repeats.
    #[derive(Debug)]
    pub struct ScriptedTimeSource {
        pub readings: Mutex<Vec<Option<TimeInfo>>>,
    }

    impl ScriptedTimeSource {
        pub fn new(readings: Vec<Option<TimeInfo>>) -> Self {
            Self { readings: Mutex::new(readings) }
        }
    }

    impl TimeSource for ScriptedTimeSource {
        async fn time(&self) -> Result<Option<TimeInfo>, TransportError> {
            let mut readings = self.readings.lock().unwrap();
            if readings.len() > 1 {
                Ok(readings.remove(0))
            } else {
                Ok(readings.first().cloned().flatten())
            }
        }
    }
}
