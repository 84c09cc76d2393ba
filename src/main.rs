/*
 *  main.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Entry point - configure, boot, run until signalled
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

use anyhow::Context;
use env_logger::Env;
use log::{error, info};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use cellclock::boot::boot;
use cellclock::clock::Rtc;
use cellclock::config::{self, Config, DriverKind};
use cellclock::display::drivers::{MockDriver, TerminalDriver};
use cellclock::display::{BoxedDriver, DisplayManager};
use cellclock::geoloc::configured_coordinates;
use cellclock::runtime::{run, RuntimeSettings};
use cellclock::sync::ClockSync;
use cellclock::timesource::HostTimeSource;
use cellclock::timezone::TzResolver;
use cellclock::transport::HttpTransport;
use cellclock::weather::Weather;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn create_driver(cfg: &Config) -> BoxedDriver {
    let (width, height) = cfg.display_size();
    match cfg.driver() {
        DriverKind::Terminal => Box::new(TerminalDriver::stdout(width, height)),
        DriverKind::Headless => Box::new(MockDriver::new(width, height)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("loading configuration")?;

    // Initialize the logger with the level from config or CLI
    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level()))
        .format_timestamp_secs()
        .init();

    info!("{} v.{} built {} ({})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    let policy = cfg.connect_policy();
    let transport = Arc::new(
        HttpTransport::new(cfg.routes(), cfg.probe_url(), cfg.http_retries(), cfg.http_timeout())
            .context("building HTTP transport")?,
    );
    let source = Arc::new(HostTimeSource::new(cfg.zone(), cfg.geoip_url()));
    let resolver = TzResolver::new(Arc::clone(&transport), policy);
    let sync = Arc::new(ClockSync::new(source, resolver, policy, Arc::new(Rtc::new())));

    let (lat, lng) = cfg.coordinates();
    let coordinates = configured_coordinates(lat, lng).context("weather location")?;
    let mut weather = Weather::new(Arc::clone(&transport), policy, coordinates);

    let mut display = DisplayManager::new_with_driver(
        create_driver(&cfg),
        cfg.clock_style(),
        cfg.temperature_unit(),
        cfg.brightness(),
    )
    .context("initialising display")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal_handler().await {
            error!("signal handler failed: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    // boot errors stop the clock rather than show a wrong time
    let outcome = tokio::select! {
        outcome = boot(&mut display, &sync, &mut weather) => outcome.context("boot")?,
        _ = wait_for_stop(shutdown_rx.clone()) => {
            info!("stopped during boot");
            display.clear()?;
            return Ok(());
        }
    };

    let settings = RuntimeSettings {
        tick_interval: cfg.tick_interval(),
        flush_interval: cfg.flush_interval(),
        refresh_interval_mins: cfg.refresh_interval_mins(),
        dst_resync: cfg.dst_resync(),
    };
    run(display, sync, weather, outcome, settings, shutdown_rx)
        .await
        .context("render loop")?;

    info!("Main application exiting.");
    Ok(())
}

async fn wait_for_stop(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // sender gone, never stopping
            std::future::pending::<()>().await;
        }
    }
}
