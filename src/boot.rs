/*
 *  boot.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Boot sequence - loading screen, clock sync, first weather
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

use log::info;
use thiserror::Error;

use crate::display::{DisplayError, DisplayManager, LoadingProgress};
use crate::geoloc::LocationError;
use crate::sync::{ClockState, ClockSync, SyncError};
use crate::timesource::TimeSource;
use crate::transport::Transport;
use crate::weather::{Weather, WeatherApiError, WeatherSnapshot};

#[derive(Debug, Error)]
pub enum BootError {
    #[error("display: {0}")]
    Display(#[from] DisplayError),
    #[error("clock sync: {0}")]
    Sync(#[from] SyncError),
    #[error("weather location: {0}")]
    Location(#[from] LocationError),
    #[error("weather: {0}")]
    Weather(#[from] WeatherApiError),
}

/// What the runtime starts from.
#[derive(Debug, Clone)]
pub struct BootOutcome {
    pub clock: ClockState,
    pub weather: WeatherSnapshot,
}

/// Run the boot sequence; any failure stops it.
///
/// The loading animation advances on every connectivity poll. On success
/// the screen shows the first weather and the current time.
pub async fn boot<S, T>(
    display: &mut DisplayManager,
    sync: &ClockSync<S, T>,
    weather: &mut Weather<T>,
) -> Result<BootOutcome, BootError>
where
    S: TimeSource,
    T: Transport + 'static,
{
    display.clear()?;
    display.start_loading()?;
    display.flush()?;

    let clock = sync.sync(&mut LoadingProgress::new(display)).await?;
    weather.locate_with_progress(&mut LoadingProgress::new(display)).await?;
    let snapshot = weather
        .fetch_weather_data_with_progress(&mut LoadingProgress::new(display))
        .await?;

    display.stop_loading();
    display.clear()?;
    display.set_weather(snapshot.clone())?;
    display.draw_clock(&sync.rtc().datetime())?;
    display.flush()?;
    info!("boot complete, zone {} ({})", clock.zone, clock.tz);

    Ok(BootOutcome { clock, weather: snapshot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Rtc;
    use crate::display::components::ClockStyle;
    use crate::display::drivers::MockDriver;
    use crate::display::{MATRIX_HEIGHT, MATRIX_WIDTH};
    use crate::geoloc::Coordinates;
    use crate::timesource::testing::ScriptedTimeSource;
    use crate::timesource::TimeInfo;
    use crate::timezone::{TzResolver, UNKNOWN_ZONE};
    use crate::transport::testing::CannedTransport;
    use crate::transport::{ConnectPolicy, ROUTE_GEOIP, ROUTE_TIME, ROUTE_WEATHER};
    use crate::weather::TemperatureUnit;
    use crate::weather_glyph::WeatherGlyph;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const UTC: i64 = 1_700_000_000;

    fn reading(zone: &str) -> Option<TimeInfo> {
        Some(TimeInfo { utc_epoch_seconds: UTC, zone: zone.to_string() })
    }

    type Fixture = (
        DisplayManager,
        MockDriver,
        ClockSync<ScriptedTimeSource, CannedTransport>,
        Weather<CannedTransport>,
    );

    const HOME: Coordinates = Coordinates { latitude: 51.48, longitude: 0.07 };

    fn fixture(transport: Arc<CannedTransport>, coordinates: Option<Coordinates>) -> Fixture {
        let mock = MockDriver::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let display = DisplayManager::new_with_driver(
            Box::new(mock.clone()),
            ClockStyle::Compact,
            TemperatureUnit::Celsius,
            0.6,
        )
        .unwrap();
        let source = ScriptedTimeSource::new(vec![None, None, reading(UNKNOWN_ZONE), reading("GB,Europe/London")]);
        let sync = ClockSync::new(
            Arc::new(source),
            TzResolver::new(Arc::clone(&transport), ConnectPolicy::default()),
            ConnectPolicy::default(),
            Arc::new(Rtc::new()),
        );
        let weather = Weather::new(transport, ConnectPolicy::default(), coordinates);
        (display, mock, sync, weather)
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_shows_loading_then_clock_and_weather() {
        let transport = CannedTransport::with(
            ROUTE_TIME,
            json!({ "hasDayLightSaving": false, "standardUtcOffset": { "seconds": 0 } }),
        );
        transport.set(ROUTE_WEATHER, json!({ "current_weather": { "weathercode": 0, "temperature": 9.6 } }));
        let (mut display, mock, sync, mut weather) = fixture(Arc::new(transport), Some(HOME));

        let outcome = boot(&mut display, &sync, &mut weather).await.unwrap();

        assert_eq!(outcome.clock.corrected_epoch, UTC);
        assert_eq!(outcome.weather.code, 0);
        assert!(!display.is_loading());

        let state = mock.state();
        let state = state.lock().unwrap();
        // first loading frame plus one per poll, then the clock screen
        assert!(state.update_count >= 4);
        let frame = state.last_frame.as_ref().unwrap();
        let sun = WeatherGlyph::Sun.pixels(embedded_graphics::prelude::Point::zero()).count();
        assert!(frame.lit_pixels() > sun);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_halts_on_weather_error() {
        let transport = CannedTransport::with(
            ROUTE_TIME,
            json!({ "hasDayLightSaving": false, "standardUtcOffset": { "seconds": 3600 } }),
        );
        transport.set(ROUTE_WEATHER, json!({ "error": true, "reason": "bad latitude" }));
        let (mut display, _mock, sync, mut weather) = fixture(Arc::new(transport), Some(HOME));

        let err = boot(&mut display, &sync, &mut weather).await.unwrap_err();
        assert!(matches!(err, BootError::Weather(WeatherApiError::MissingData(_))));
        assert!(display.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_waits_out_failed_geoip_lookups() {
        let transport = Arc::new(CannedTransport::with(
            ROUTE_TIME,
            json!({ "hasDayLightSaving": false, "standardUtcOffset": { "seconds": 0 } }),
        ));
        transport.set(ROUTE_WEATHER, json!({ "current_weather": { "weathercode": 3, "temperature": 4.0 } }));
        let (mut display, mock, sync, mut weather) = fixture(Arc::clone(&transport), None);

        let mut booting = Box::pin(boot(&mut display, &sync, &mut weather));
        // no GeoIP reply yet: boot keeps polling instead of failing
        assert!(tokio::time::timeout(Duration::from_secs(10), &mut booting).await.is_err());
        assert!(transport.request_count(ROUTE_GEOIP) >= 2);
        assert_eq!(transport.request_count(ROUTE_WEATHER), 0);

        transport.set(ROUTE_GEOIP, json!({ "country_code": "GB", "latitude": 51.48, "longitude": 0.07 }));
        let outcome = booting.await.unwrap();
        assert_eq!(outcome.weather.code, 3);
        assert_eq!(weather.coordinates(), Some(HOME));
        assert!(mock.state().lock().unwrap().update_count > 5);
    }
}
