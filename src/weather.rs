/*
 *  weather.rs
 * 
 *  cellclock - connected LED matrix clock
 *	(c) 2020-26 Stuart Hunter
 *
 *	Current weather from the weather route, refreshed on request
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use serde::{Deserialize, Serialize};
use serde_json::{Value, Error as JsonError};
use std::fmt::{self, Display};
use std::sync::Arc;
use log::{debug, info, error};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::geoloc::{wait_for_coordinates, Coordinates, LocationError};
use crate::transport::{web_request, ConnectPolicy, Progress, Transport, TransportError, ROUTE_WEATHER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn suffix(self) -> char {
        match self {
            TemperatureUnit::Celsius => 'c',
            TemperatureUnit::Fahrenheit => 'f',
        }
    }

    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

// Custom error type for weather API operations.
#[derive(Debug)]
pub enum WeatherApiError {
    TransportError(TransportError),
    DeserializationError(JsonError),
    MissingData(String),
}

impl Display for WeatherApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherApiError::TransportError(e) => write!(f, "Weather service error: {}", e),
            WeatherApiError::DeserializationError(e) => write!(f, "JSON deserialization error: {}", e),
            WeatherApiError::MissingData(msg) => write!(f, "Missing weather data: {}", msg),
        }
    }
}

impl std::error::Error for WeatherApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WeatherApiError::TransportError(e) => Some(e),
            WeatherApiError::DeserializationError(e) => Some(e),
            WeatherApiError::MissingData(_) => None,
        }
    }
}

impl From<TransportError> for WeatherApiError {
    fn from(err: TransportError) -> Self {
        WeatherApiError::TransportError(err)
    }
}

impl From<JsonError> for WeatherApiError {
    fn from(err: JsonError) -> Self {
        WeatherApiError::DeserializationError(err)
    }
}

/// `current_weather` block of the weather service reply
#[derive(Debug, Clone, Deserialize)]
struct CurrentWeather {
    weathercode: i32,
    temperature: f64,
}

/// Latest conditions as shown on the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// WMO weather interpretation code
    pub code: i32,
    pub temperature_celsius: f64,
}

impl WeatherSnapshot {
    pub fn from_body(body: &Value) -> Result<Self, WeatherApiError> {
        let current = body
            .get("current_weather")
            .ok_or_else(|| WeatherApiError::MissingData("current_weather".to_string()))?;
        let current: CurrentWeather = serde_json::from_value(current.clone())?;
        Ok(Self {
            code: current.weathercode,
            temperature_celsius: current.temperature,
        })
    }

    /// Whole degrees in `unit`, rounded down.
    pub fn temperature(&self, unit: TemperatureUnit) -> i64 {
        unit.from_celsius(self.temperature_celsius).floor() as i64
    }
}

// Main Weather client
#[derive(Debug)]
pub struct Weather<T> {
    transport: Arc<T>,
    policy: ConnectPolicy,
    coordinates: Option<Coordinates>,
    pub weather_data: Option<WeatherSnapshot>,
    pub last_fetch_time: Option<Instant>, // track last fetched
}

impl<T: Transport + 'static> Weather<T> {
    /// `None` coordinates are looked up over GeoIP by [`Weather::locate_with_progress`].
    pub fn new(transport: Arc<T>, policy: ConnectPolicy, coordinates: Option<Coordinates>) -> Self {
        if let Some(c) = &coordinates {
            info!("Weather location: {}", c);
        }
        Self {
            transport,
            policy,
            coordinates,
            weather_data: None,
            last_fetch_time: None,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    /// Configured coordinates, else wait on a GeoIP lookup and keep the result.
    pub async fn locate_with_progress<P>(&mut self, progress: &mut P) -> Result<Coordinates, LocationError>
    where
        P: Progress + Send + ?Sized,
    {
        if let Some(c) = self.coordinates {
            return Ok(c);
        }
        let c = wait_for_coordinates(self.transport.as_ref(), &self.policy, progress).await?;
        info!("Weather location: {}", c);
        self.coordinates = Some(c);
        Ok(c)
    }

    /// Query string for the weather route.
    pub fn path(&self) -> Result<String, WeatherApiError> {
        let c = self
            .coordinates
            .ok_or_else(|| WeatherApiError::MissingData("weather location".to_string()))?;
        Ok(format!("?latitude={}&longitude={}&current_weather=true", c.latitude, c.longitude))
    }

    pub async fn fetch_weather_data(&mut self) -> Result<WeatherSnapshot, WeatherApiError> {
        self.fetch_weather_data_with_progress(&mut ()).await
    }

    /// Fetch current conditions, animating `progress` while the link is down.
    pub async fn fetch_weather_data_with_progress<P>(&mut self, progress: &mut P) -> Result<WeatherSnapshot, WeatherApiError>
    where
        P: Progress + Send + ?Sized,
    {
        let path = self.path()?;
        let body = web_request(self.transport.as_ref(), &self.policy, ROUTE_WEATHER, &path, progress).await?;
        let snapshot = WeatherSnapshot::from_body(&body)?;
        info!("Weather fetched: code {} at {:.1}C", snapshot.code, snapshot.temperature_celsius);
        self.weather_data = Some(snapshot.clone());
        self.last_fetch_time = Some(Instant::now()); // Record fetch time
        Ok(snapshot)
    }

    /// Refreshes on every request received; publishes on a watch channel.
    ///
    /// A failed refresh is logged and the previous snapshot stays current.
    /// The task ends when `shutdown` flips or every request sender is gone.
    pub fn start_polling_with_watch(
        mut self,
        initial: WeatherSnapshot,
        mut refresh_rx: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, watch::Receiver<WeatherSnapshot>) {
        let (weather_tx, weather_rx) = watch::channel(initial);

        let poll_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    request = refresh_rx.recv() => {
                        if request.is_none() {
                            debug!("weather refresh channel closed");
                            break;
                        }
                        // the fetch can block in an unbounded connectivity wait
                        let fetched = tokio::select! {
                            fetched = self.fetch_weather_data() => fetched,
                            _ = shutdown.changed() => {
                                info!("Weather refresh abandoned on stop signal.");
                                break;
                            }
                        };
                        match fetched {
                            Ok(snapshot) => {
                                weather_tx.send_if_modified(|current| {
                                    let changed = *current != snapshot;
                                    if changed {
                                        *current = snapshot;
                                    }
                                    changed
                                });
                            }
                            Err(e) => error!("Weather refresh failed, keeping previous: {}", e),
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("Weather polling received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        (poll_handle, weather_rx)
    }
}
