/*
 *  runtime.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime tasks - second tick, weather refresh, DST watch and render
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
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::boot::BootOutcome;
use crate::clock::{Rtc, RtcDateTime};
use crate::display::{DisplayError, DisplayManager};
use crate::iso8601::format_epoch;
use crate::sync::{ClockState, ClockSync};
use crate::timesource::TimeSource;
use crate::transport::Transport;
use crate::weather::{Weather, WeatherSnapshot};

/// Spacing between re-sync attempts around a DST boundary.
const RESYNC_RETRY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// RTC poll period
    pub tick_interval: Duration,
    /// framebuffer to driver period
    pub flush_interval: Duration,
    pub refresh_interval_mins: u32,
    pub dst_resync: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            flush_interval: Duration::from_millis(100),
            refresh_interval_mins: 60,
            dst_resync: false,
        }
    }
}

/// Weather refresh point: second zero of every `every_mins`-th minute.
pub fn is_refresh_boundary(now: &RtcDateTime, every_mins: u32) -> bool {
    now.second == 0 && now.minute % every_mins.max(1) == 0
}

/// Poll the RTC; publish each new second and request weather on the boundary.
pub async fn tick_task(
    rtc: Arc<Rtc>,
    settings: RuntimeSettings,
    clock_tx: watch::Sender<RtcDateTime>,
    refresh_tx: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last_second = rtc.datetime().second;
    let mut ticker = tokio::time::interval(settings.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = rtc.datetime();
                if now.second == last_second {
                    continue;
                }
                last_second = now.second;
                clock_tx.send_replace(now);

                if is_refresh_boundary(&now, settings.refresh_interval_mins) {
                    match refresh_tx.try_send(()) {
                        Ok(()) => debug!("weather refresh requested at {:02}:{:02}", now.hour, now.minute),
                        Err(TrySendError::Full(_)) => debug!("weather refresh already pending"),
                        Err(TrySendError::Closed(_)) => warn!("weather task gone, refresh dropped"),
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("tick task stopped");
}

/// Warn when the DST boundary passes; optionally re-sync the clock.
pub async fn dst_watch_task<S, T>(
    sync: Arc<ClockSync<S, T>>,
    initial: ClockState,
    resync: bool,
    mut shutdown: watch::Receiver<bool>,
) where
    S: TimeSource,
    T: Transport,
{
    let mut state = initial;
    let mut min_wait = Duration::ZERO;
    loop {
        let Some(transition) = state.tz.dst_transition_epoch() else {
            debug!("zone {} has no DST transition to watch", state.zone);
            return;
        };
        let utc_now = sync.rtc().epoch() - state.tz.total_offset_seconds();
        let wait = Duration::from_secs((transition - utc_now).max(0) as u64).max(min_wait);
        info!("DST transition at {} UTC, in {}s", format_epoch(transition), wait.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => return,
        }

        if !resync {
            warn!("DST transition at {} passed; displayed time is off until restart", format_epoch(transition));
            return;
        }

        info!("DST transition passed, re-syncing clock");
        min_wait = RESYNC_RETRY;
        let mut progress = ();
        let synced = tokio::select! {
            synced = sync.sync(&mut progress) => synced,
            _ = shutdown.changed() => return,
        };
        match synced {
            Ok(next) => state = next,
            Err(e) => error!("DST re-sync failed: {}", e),
        }
    }
}

/// Own the display: redraw on clock/weather changes, flush on a fixed period.
///
/// Runtime draw and driver failures are logged; the loop keeps going.
/// Returns after clearing the panel once shutdown flips.
pub async fn render_task(
    mut display: DisplayManager,
    mut clock_rx: watch::Receiver<RtcDateTime>,
    mut weather_rx: watch::Receiver<WeatherSnapshot>,
    flush_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), DisplayError> {
    let mut flush = tokio::time::interval(flush_interval);
    flush.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut weather_open = true;

    let now = *clock_rx.borrow_and_update();
    if let Err(e) = display.draw_clock(&now) {
        error!("clock draw failed: {}", e);
    }
    let snapshot = weather_rx.borrow_and_update().clone();
    if let Err(e) = display.set_weather(snapshot) {
        error!("weather draw failed: {}", e);
    }

    loop {
        tokio::select! {
            changed = clock_rx.changed() => {
                if changed.is_err() {
                    info!("clock channel closed");
                    break;
                }
                let now = *clock_rx.borrow_and_update();
                if let Err(e) = display.draw_clock(&now) {
                    error!("clock draw failed: {}", e);
                }
            }
            changed = weather_rx.changed(), if weather_open => {
                if changed.is_err() {
                    debug!("weather channel closed");
                    weather_open = false;
                    continue;
                }
                let snapshot = weather_rx.borrow_and_update().clone();
                if let Err(e) = display.set_weather(snapshot) {
                    error!("weather draw failed: {}", e);
                }
            }
            _ = flush.tick() => {
                if let Err(e) = display.flush() {
                    error!("display update failed: {}", e);
                }
            }
            _ = shutdown.changed() => {
                info!("render loop received stop signal");
                break;
            }
        }
    }

    // Clear the display on shutdown
    display.clear()
}

/// Spawn tick, weather and DST tasks, then render until shutdown.
pub async fn run<S, T>(
    display: DisplayManager,
    sync: Arc<ClockSync<S, T>>,
    weather: Weather<T>,
    boot: BootOutcome,
    settings: RuntimeSettings,
    shutdown: watch::Receiver<bool>,
) -> Result<(), DisplayError>
where
    S: TimeSource + 'static,
    T: Transport + 'static,
{
    let rtc = Arc::clone(sync.rtc());
    let (clock_tx, clock_rx) = watch::channel(rtc.datetime());
    let (refresh_tx, refresh_rx) = mpsc::channel(1);

    let (weather_handle, weather_rx) = weather.start_polling_with_watch(boot.weather, refresh_rx, shutdown.clone());
    let tick_handle = tokio::spawn(tick_task(rtc, settings, clock_tx, refresh_tx, shutdown.clone()));
    let dst_handle = tokio::spawn(dst_watch_task(sync, boot.clock, settings.dst_resync, shutdown.clone()));

    let result = render_task(display, clock_rx, weather_rx, settings.flush_interval, shutdown).await;

    for (name, handle) in [("tick", tick_handle), ("dst watch", dst_handle), ("weather", weather_handle)] {
        if let Err(e) = handle.await {
            error!("{} task failed to join: {}", name, e);
        }
    }
    info!("runtime stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::components::ClockStyle;
    use crate::display::drivers::MockDriver;
    use crate::display::{MATRIX_HEIGHT, MATRIX_WIDTH};
    use crate::geoloc::Coordinates;
    use crate::timesource::testing::ScriptedTimeSource;
    use crate::timesource::TimeInfo;
    use crate::timezone::{DstInfo, TzOffsetInfo, TzResolver};
    use crate::transport::testing::CannedTransport;
    use crate::transport::{ConnectPolicy, ROUTE_TIME, ROUTE_WEATHER};
    use crate::weather::TemperatureUnit;
    use crate::weather_glyph::WeatherGlyph;
    use embedded_graphics::prelude::*;
    use embedded_graphics::primitives::Rectangle;
    use serde_json::json;

    // 2023-11-14 12:59:58
    const BEFORE_TOP_OF_HOUR: i64 = 1_699_966_798;

    fn at(hour: u32, minute: u32, second: u32) -> RtcDateTime {
        RtcDateTime { hour, minute, second, ..Default::default() }
    }

    fn clock_sync(transport: Arc<CannedTransport>, utc: i64) -> Arc<ClockSync<ScriptedTimeSource, CannedTransport>> {
        let source = ScriptedTimeSource::new(vec![Some(TimeInfo {
            utc_epoch_seconds: utc,
            zone: "GB,Europe/London".to_string(),
        })]);
        Arc::new(ClockSync::new(
            Arc::new(source),
            TzResolver::new(transport, ConnectPolicy::default()),
            ConnectPolicy::default(),
            Arc::new(Rtc::new()),
        ))
    }

    fn state(tz: TzOffsetInfo, corrected_epoch: i64) -> ClockState {
        ClockState {
            zone: "GB,Europe/London".to_string(),
            tz,
            utc_epoch: corrected_epoch - tz.total_offset_seconds(),
            corrected_epoch,
        }
    }

    #[test]
    fn test_refresh_boundary() {
        assert!(is_refresh_boundary(&at(13, 0, 0), 60));
        assert!(!is_refresh_boundary(&at(13, 0, 1), 60));
        assert!(!is_refresh_boundary(&at(13, 30, 0), 60));
        assert!(is_refresh_boundary(&at(13, 30, 0), 15));
        assert!(is_refresh_boundary(&at(13, 7, 0), 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_publishes_seconds_and_requests_refresh() {
        let rtc = Arc::new(Rtc::new());
        rtc.set_epoch(BEFORE_TOP_OF_HOUR);
        let (clock_tx, mut clock_rx) = watch::channel(rtc.datetime());
        let (refresh_tx, mut refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(tick_task(rtc, RuntimeSettings::default(), clock_tx, refresh_tx, shutdown_rx));

        clock_rx.changed().await.unwrap();
        assert_eq!(*clock_rx.borrow_and_update(), RtcDateTime::from_epoch(BEFORE_TOP_OF_HOUR + 1));
        assert!(refresh_rx.try_recv().is_err());

        clock_rx.changed().await.unwrap();
        let now = *clock_rx.borrow_and_update();
        assert_eq!((now.hour, now.minute, now.second), (13, 0, 0));
        tokio::time::timeout(Duration::from_millis(50), refresh_rx.recv()).await.unwrap().unwrap();

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dst_watch_warns_once_without_resync() {
        let transport = Arc::new(CannedTransport::default());
        let sync = clock_sync(Arc::clone(&transport), 0);
        let tz = TzOffsetInfo {
            standard_offset_seconds: 0,
            dst: Some(DstInfo { offset_seconds: 3600, transition_epoch: 1_000 + 3_600 + 5, active: false }),
        };
        sync.rtc().set_epoch(1_000 + 3_600);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = dst_watch_task(Arc::clone(&sync), state(tz, 1_000 + 3_600), false, shutdown_rx);
        tokio::time::timeout(Duration::from_secs(6), task).await.unwrap();
        assert_eq!(transport.request_count(ROUTE_TIME), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dst_watch_resyncs_when_enabled() {
        // 2023-11-05T06:00:00Z, New York leaves DST
        const FALL_BACK: i64 = 1_699_164_000;
        let transport = Arc::new(CannedTransport::with(
            ROUTE_TIME,
            json!({
                "hasDayLightSaving": true,
                "isDayLightSavingActive": false,
                "standardUtcOffset": { "seconds": -18000 },
                "dstInterval": {
                    "dstOffsetToStandardTime": { "seconds": 3600 },
                    "dstStart": "2024-03-10T07:00:00Z",
                    "dstEnd": "2023-11-05T06:00:00Z"
                }
            }),
        ));
        let sync = clock_sync(Arc::clone(&transport), FALL_BACK + 2);
        let summer = TzOffsetInfo {
            standard_offset_seconds: -18000,
            dst: Some(DstInfo { offset_seconds: 3600, transition_epoch: FALL_BACK, active: true }),
        };
        let local = FALL_BACK - 2 - 18000 + 3600;
        sync.rtc().set_epoch(local);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(dst_watch_task(Arc::clone(&sync), state(summer, local), true, shutdown_rx));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(transport.request_count(ROUTE_TIME), 1);
        // re-synced at the boundary, then free-ran for about a second
        let drift = sync.rtc().epoch() - (FALL_BACK + 2 - 18000);
        assert!((0..=1).contains(&drift), "drift {drift}");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_weather_at_top_of_hour() {
        let transport = Arc::new(CannedTransport::with(
            ROUTE_WEATHER,
            json!({ "current_weather": { "weathercode": 61, "temperature": 4.2 } }),
        ));
        let sync = clock_sync(Arc::clone(&transport), BEFORE_TOP_OF_HOUR);
        sync.rtc().set_epoch(BEFORE_TOP_OF_HOUR);

        let mock = MockDriver::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let display = DisplayManager::new_with_driver(
            Box::new(mock.clone()),
            ClockStyle::Compact,
            TemperatureUnit::Celsius,
            0.6,
        )
        .unwrap();
        let weather = Weather::new(
            Arc::clone(&transport),
            ConnectPolicy::default(),
            Some(Coordinates { latitude: 51.48, longitude: 0.07 }),
        );
        let boot = BootOutcome {
            clock: state(TzOffsetInfo::fixed(0), BEFORE_TOP_OF_HOUR),
            weather: WeatherSnapshot { code: 0, temperature_celsius: 5.0 },
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(display, sync, weather, boot, RuntimeSettings::default(), shutdown_rx));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(transport.request_count(ROUTE_WEATHER), 1);
        {
            let state = mock.state();
            let state = state.lock().unwrap();
            assert!(state.update_count >= 3);
            let frame = state.last_frame.as_ref().unwrap();
            let glyph_area = Rectangle::new(Point::new(42, 0), Size::new(11, 11));
            assert_eq!(frame.lit_in(&glyph_area), WeatherGlyph::Rain.pixels(Point::zero()).count());
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(mock.state().lock().unwrap().clear_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_while_refresh_waits_for_link() {
        let transport = Arc::new(CannedTransport::with(
            ROUTE_WEATHER,
            json!({ "current_weather": { "weathercode": 61, "temperature": 4.2 } }),
        ));
        transport.offline_polls.store(usize::MAX, std::sync::atomic::Ordering::SeqCst);
        let sync = clock_sync(Arc::clone(&transport), BEFORE_TOP_OF_HOUR);
        sync.rtc().set_epoch(BEFORE_TOP_OF_HOUR);

        let mock = MockDriver::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let display = DisplayManager::new_with_driver(
            Box::new(mock.clone()),
            ClockStyle::Compact,
            TemperatureUnit::Celsius,
            0.6,
        )
        .unwrap();
        let weather = Weather::new(
            Arc::clone(&transport),
            ConnectPolicy::default(),
            Some(Coordinates { latitude: 51.48, longitude: 0.07 }),
        );
        let boot = BootOutcome {
            clock: state(TzOffsetInfo::fixed(0), BEFORE_TOP_OF_HOUR),
            weather: WeatherSnapshot { code: 0, temperature_celsius: 5.0 },
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(display, sync, weather, boot, RuntimeSettings::default(), shutdown_rx));
        // the top-of-hour refresh is now stuck waiting for connectivity
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.request_count(ROUTE_WEATHER), 0);

        shutdown_tx.send(true).unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(3600), handle).await;
        stopped.expect("run did not return after shutdown").unwrap().unwrap();
        assert_eq!(mock.state().lock().unwrap().clear_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dst_resync_stops_on_shutdown_while_offline() {
        let transport = Arc::new(CannedTransport::default());
        transport.offline_polls.store(usize::MAX, std::sync::atomic::Ordering::SeqCst);
        let sync = clock_sync(Arc::clone(&transport), 0);
        let tz = TzOffsetInfo {
            standard_offset_seconds: 0,
            dst: Some(DstInfo { offset_seconds: 3600, transition_epoch: 2_000, active: false }),
        };
        sync.rtc().set_epoch(1_998);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(dst_watch_task(Arc::clone(&sync), state(tz, 1_998), true, shutdown_rx));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!handle.is_finished());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(transport.request_count(ROUTE_TIME), 0);
    }
}
