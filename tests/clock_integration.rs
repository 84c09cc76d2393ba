/*
 *  tests/clock_integration.rs
 *
 *  Integration tests for boot, clock correction and the render loop
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cellclock::boot::boot;
use cellclock::clock::{corrected_epoch, Rtc, RtcDateTime};
use cellclock::display::components::ClockStyle;
use cellclock::display::drivers::MockDriver;
use cellclock::display::{DisplayManager, MATRIX_HEIGHT, MATRIX_WIDTH};
use cellclock::geoloc::Coordinates;
use cellclock::runtime::{run, RuntimeSettings};
use cellclock::sync::ClockSync;
use cellclock::timesource::{TimeInfo, TimeSource};
use cellclock::timezone::{TzOffsetInfo, TzResolver};
use cellclock::transport::{ConnectPolicy, Transport, TransportError, ROUTE_TIME, ROUTE_WEATHER};
use cellclock::weather::{TemperatureUnit, Weather};
use serde_json::{json, Value};
use tokio::sync::watch;

const UTC: i64 = 1_700_000_000;

/// Replies per route and remembers the paths asked for.
#[derive(Default)]
struct StubTransport {
    bodies: HashMap<&'static str, Value>,
    paths: Mutex<Vec<String>>,
}

impl Transport for StubTransport {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn web_get(&self, route: &str, path: &str) -> Result<Value, TransportError> {
        self.paths.lock().unwrap().push(format!("{route}{path}"));
        self.bodies
            .get(route)
            .cloned()
            .ok_or_else(|| TransportError::UnknownRoute(route.to_string()))
    }
}

struct FixedTime(TimeInfo);

impl TimeSource for FixedTime {
    async fn time(&self) -> Result<Option<TimeInfo>, TransportError> {
        Ok(Some(self.0.clone()))
    }
}

fn new_york_standard() -> StubTransport {
    let mut bodies = HashMap::new();
    bodies.insert(
        ROUTE_TIME,
        json!({
            "timeZone": "America/New_York",
            "hasDayLightSaving": true,
            "isDayLightSavingActive": false,
            "standardUtcOffset": { "seconds": -18000 },
            "dstInterval": {
                "dstOffsetToStandardTime": { "seconds": 3600 },
                "dstStart": "2024-03-10T07:00:00Z",
                "dstEnd": "2024-11-03T06:00:00Z"
            }
        }),
    );
    bodies.insert(
        ROUTE_WEATHER,
        json!({ "current_weather": { "weathercode": 3, "temperature": 6.8 } }),
    );
    StubTransport { bodies, paths: Mutex::default() }
}

fn clock_sync(transport: Arc<StubTransport>, epoch: i64) -> Arc<ClockSync<FixedTime, StubTransport>> {
    let source = FixedTime(TimeInfo { utc_epoch_seconds: epoch, zone: "US,America/New_York".to_string() });
    Arc::new(ClockSync::new(
        Arc::new(source),
        TzResolver::new(transport, ConnectPolicy::default()),
        ConnectPolicy::default(),
        Arc::new(Rtc::new()),
    ))
}

#[test]
fn test_corrected_epoch_properties() {
    assert_eq!(corrected_epoch(UTC, &TzOffsetInfo::fixed(3600)), UTC + 3600);
    assert_eq!(corrected_epoch(UTC, &TzOffsetInfo::fixed(0)), UTC);
}

#[tokio::test]
async fn test_new_york_standard_time_end_to_end() {
    let transport = Arc::new(new_york_standard());
    let sync = clock_sync(Arc::clone(&transport), UTC);

    let state = sync.sync(&mut ()).await.unwrap();

    assert_eq!(state.corrected_epoch, UTC - 18000);
    assert_eq!(sync.rtc().epoch(), UTC - 18000);
    assert_eq!(transport.paths.lock().unwrap()[0], "time/TimeZone/zone?timeZone=America/New_York");
}

#[tokio::test(start_paused = true)]
async fn test_boot_then_run_pushes_frames() {
    let transport = Arc::new(new_york_standard());
    let sync = clock_sync(Arc::clone(&transport), UTC);
    let mut weather = Weather::new(
        Arc::clone(&transport),
        ConnectPolicy::default(),
        Some(Coordinates { latitude: 40.71, longitude: -74.01 }),
    );
    let mock = MockDriver::new(MATRIX_WIDTH, MATRIX_HEIGHT);
    let mut display = DisplayManager::new_with_driver(
        Box::new(mock.clone()),
        ClockStyle::Compact,
        TemperatureUnit::Celsius,
        0.6,
    )
    .unwrap();

    let outcome = boot(&mut display, &sync, &mut weather).await.unwrap();
    assert_eq!(outcome.clock.corrected_epoch, UTC - 18000);
    assert_eq!(outcome.weather.code, 3);
    // 2023-11-14 17:13:20 local
    assert_eq!(
        sync.rtc().datetime(),
        RtcDateTime { year: 2023, month: 11, day: 14, weekday: 1, hour: 17, minute: 13, second: 20 }
    );

    let frames_after_boot = mock.state().lock().unwrap().update_count;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(run(display, Arc::clone(&sync), weather, outcome, RuntimeSettings::default(), shutdown_rx));

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let frames = mock.state().lock().unwrap().update_count;
    // one frame per second tick at least
    assert!(frames >= frames_after_boot + 3, "{frames} frames");

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let state = mock.state();
    let state = state.lock().unwrap();
    assert_eq!(state.last_frame.as_ref().unwrap().lit_pixels(), 0);
}
