/*
 *  geoloc.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  IP geolocation - zone hint and coordinates when not configured
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
use std::time::Duration;

use log::{info, warn};
use reqwest::{header, Client};
use serde::Deserialize;
use thiserror::Error;

use crate::transport::{poll_until, ConnectPolicy, Progress, Transport, TransportError, ROUTE_GEOIP};

pub const GEOIP_URL: &str = "https://ipapi.co/json/";

#[derive(Debug, Clone, Deserialize)]
pub struct GeoLocation {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region_code: String,
    #[serde(default)]
    pub country_code: String,
    /// IANA zone, e.g. `Europe/London`
    #[serde(default)]
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// `"<country>,<zone>"`, the shape the timezone resolver expects.
    pub fn zone_hint(&self) -> Option<String> {
        if self.timezone.is_empty() {
            return None;
        }
        let country = if self.country_code.is_empty() { "XX" } else { &self.country_code };
        Some(format!("{},{}", country, self.timezone))
    }
}

pub async fn fetch_location(url: &str) -> Result<GeoLocation, reqwest::Error> {
    const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));
    let mut headers = header::HeaderMap::new();
    headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
    headers.insert("Accept", header::HeaderValue::from_static("application/json"));
    headers.insert("Connection", header::HeaderValue::from_static("close"));

    let client = Client::builder()
        .connect_timeout(Duration::from_millis(800))
        .default_headers(headers)
        .timeout(Duration::from_secs(3))
        .build()?;

    client
        .get(url)
        .send()
        .await?
        .error_for_status()? // none 2xx raise
        .json::<GeoLocation>()
        .await
}

/// Where the weather is fetched for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid coordinates {0}, {1}")]
    InvalidCoordinates(f64, f64),
    #[error("GeoIP lookup failed: {0}")]
    Unavailable(#[from] TransportError),
}

/// Coordinates from config, `None` when either half is missing.
pub fn configured_coordinates(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Coordinates>, LocationError> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        info!("No weather location in config, GeoIP lookup at boot");
        return Ok(None);
    };
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        warn!("Invalid coordinates in config: {}, {}", lat, lng);
        return Err(LocationError::InvalidCoordinates(lat, lng));
    }
    info!("Using weather location from config: {:.4}, {:.4}", lat, lng);
    Ok(Some(Coordinates { latitude: lat, longitude: lng }))
}

/// Look up coordinates on the GeoIP route, retrying until a usable reply.
///
/// Follows `policy` like any other request: unbounded unless a timeout is set.
pub async fn wait_for_coordinates<T, P>(
    transport: &T,
    policy: &ConnectPolicy,
    progress: &mut P,
) -> Result<Coordinates, LocationError>
where
    T: Transport + ?Sized,
    P: Progress + Send + ?Sized,
{
    let geo = poll_until(policy, progress, move || async move {
        if !transport.is_connected().await {
            return None;
        }
        let located = transport.web_get(ROUTE_GEOIP, "/").await.and_then(|body| {
            serde_json::from_value::<GeoLocation>(body).map_err(|e| TransportError::Body(e.to_string()))
        });
        match located {
            Ok(geo) => Some(geo),
            Err(e) => {
                warn!("GeoIP lookup failed, retrying: {}", e);
                None
            }
        }
    })
    .await?;

    info!(
        "GeoIP lookup successful: {} {} ({:.4}, {:.4})",
        geo.city, geo.region_code, geo.latitude, geo.longitude
    );
    Ok(Coordinates { latitude: geo.latitude, longitude: geo.longitude })
}
