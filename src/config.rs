use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{collections::HashMap, fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::display::components::ClockStyle;
use crate::display::{MATRIX_HEIGHT, MATRIX_WIDTH};
use crate::geoloc::GEOIP_URL;
use crate::transport::{ConnectPolicy, ROUTE_GEOIP, ROUTE_TIME, ROUTE_WEATHER};
use crate::weather::TemperatureUnit;

pub const DEFAULT_TIME_URL: &str = "https://timeapi.io/api";
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_PROBE_URL: &str = "https://timeapi.io";
pub const DEFAULT_BRIGHTNESS: f32 = 0.6;
pub const DEFAULT_REFRESH_MINS: u32 = 60;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every field is optional; accessors supply defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// General options
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// LED matrix geometry & behavior
    pub display: Option<DisplayConfig>,
    pub time: Option<TimeConfig>,
    pub network: Option<NetworkConfig>,
    pub services: Option<ServicesConfig>,
    pub weather: Option<WeatherConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub brightness: Option<f32>,    // 0.0-1.0
    pub driver: Option<DriverKind>,
    pub style: Option<ClockStyle>,
    pub flush_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TimeConfig {
    /// coarse hint `"<country>,<region>"`, GeoIP when absent
    pub zone: Option<String>,
    /// RTC poll period of the second tick
    pub poll_interval_ms: Option<u64>,
    /// re-sync the clock when a DST transition passes
    pub dst_resync: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NetworkConfig {
    pub connect_poll_secs: Option<u64>,
    /// absent: wait for connectivity forever
    pub connect_timeout_secs: Option<u64>,
    pub probe_url: Option<String>,
    pub retries: Option<u8>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServicesConfig {
    pub time_url: Option<String>,
    pub weather_url: Option<String>,
    pub geoip_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WeatherConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub units: Option<TemperatureUnit>,
    pub refresh_interval_mins: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// ANSI true-colour rendering on stdout
    #[default]
    Terminal,
    /// frames are kept in memory only
    Headless,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "cellclock", version, about = "Connected LED matrix clock")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Debug logging, shorthand for --log-level debug
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(short, long)]
    pub brightness: Option<f32>,
    #[arg(long, value_enum)]
    pub driver: Option<DriverKind>,
    #[arg(short, long, value_enum)]
    pub style: Option<ClockStyle>,
    /// Zone hint, e.g. "GB,Europe/London"
    #[arg(short, long)]
    pub zone: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,
    #[arg(short, long, value_enum)]
    pub units: Option<TemperatureUnit>,
    #[arg(long, action = ArgAction::Set)]
    pub dst_resync: Option<bool>,
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Layer defaults, YAML and `cli`, then validate.
pub fn load_from(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/cellclock/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/cellclock/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/cellclock.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["cellclock.yaml", "config.yaml", "config/cellclock.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// `Some` in `src` wins.
macro_rules! take {
    ($dst:expr, $src:expr, $($field:ident),+) => {
        $( if $src.$field.is_some() { $dst.$field = $src.$field; } )+
    };
}

/// Merge one optional section: fill when absent, field-merge when both exist.
fn merge_section<T>(dst: &mut Option<T>, src: Option<T>, merge_fields: impl FnOnce(&mut T, T)) {
    let Some(s) = src else { return };
    if let Some(d) = dst.as_mut() {
        merge_fields(d, s);
    } else {
        *dst = Some(s);
    }
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    merge_section(&mut dst.display, src.display, |d, s| {
        take!(d, s, width, height, brightness, driver, style, flush_interval_ms);
    });
    merge_section(&mut dst.time, src.time, |d, s| {
        take!(d, s, zone, poll_interval_ms, dst_resync);
    });
    merge_section(&mut dst.network, src.network, |d, s| {
        take!(d, s, connect_poll_secs, connect_timeout_secs, probe_url, retries, timeout_ms);
    });
    merge_section(&mut dst.services, src.services, |d, s| {
        take!(d, s, time_url, weather_url, geoip_url);
    });
    merge_section(&mut dst.weather, src.weather, |d, s| {
        take!(d, s, latitude, longitude, units, refresh_interval_mins);
    });
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                     { cfg.log_level = Some("debug".to_string()); }

    let display = cfg.display.get_or_insert_with(Default::default);
    if cli.display_width.is_some()   { display.width = cli.display_width; }
    if cli.display_height.is_some()  { display.height = cli.display_height; }
    if cli.brightness.is_some()      { display.brightness = cli.brightness; }
    if cli.driver.is_some()          { display.driver = cli.driver; }
    if cli.style.is_some()           { display.style = cli.style; }

    let time = cfg.time.get_or_insert_with(Default::default);
    if cli.zone.is_some()            { time.zone = cli.zone.clone(); }
    if cli.dst_resync.is_some()      { time.dst_resync = cli.dst_resync; }

    let weather = cfg.weather.get_or_insert_with(Default::default);
    if cli.latitude.is_some()        { weather.latitude = cli.latitude; }
    if cli.longitude.is_some()       { weather.longitude = cli.longitude; }
    if cli.units.is_some()           { weather.units = cli.units; }

    if cli.connect_timeout_secs.is_some() {
        cfg.network.get_or_insert_with(Default::default).connect_timeout_secs = cli.connect_timeout_secs;
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Validation(msg.to_string())) };

    if let Some(display) = cfg.display.as_ref() {
        if display.width == Some(0) || display.height == Some(0) {
            return invalid("display width/height must be > 0");
        }
        if let Some(b) = display.brightness {
            if !(0.0..=1.0).contains(&b) {
                return invalid("display brightness must be 0.0..=1.0");
            }
        }
        if display.flush_interval_ms == Some(0) {
            return invalid("display flush_interval_ms must be > 0");
        }
    }
    if let Some(time) = cfg.time.as_ref() {
        if time.poll_interval_ms == Some(0) {
            return invalid("time poll_interval_ms must be > 0");
        }
        if let Some(zone) = time.zone.as_deref() {
            if zone.split(',').nth(1).is_none_or(|r| r.trim().is_empty()) {
                return invalid("time zone must look like \"<country>,<region>\"");
            }
        }
    }
    if let Some(net) = cfg.network.as_ref() {
        if net.connect_poll_secs == Some(0) || net.retries == Some(0) || net.timeout_ms == Some(0) {
            return invalid("network poll, retries and timeout must be > 0");
        }
    }
    if let Some(weather) = cfg.weather.as_ref() {
        if let Some(lat) = weather.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return invalid("weather latitude must be -90..=90");
            }
        }
        if let Some(lng) = weather.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return invalid("weather longitude must be -180..=180");
            }
        }
        if let Some(mins) = weather.refresh_interval_mins {
            if mins == 0 || mins > 60 {
                return invalid("weather refresh_interval_mins must be 1..=60");
            }
        }
    }
    Ok(())
}

// Effective values with defaults applied.
impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    fn display_cfg(&self) -> DisplayConfig {
        self.display.clone().unwrap_or_default()
    }

    pub fn display_size(&self) -> (u32, u32) {
        let d = self.display_cfg();
        (d.width.unwrap_or(MATRIX_WIDTH), d.height.unwrap_or(MATRIX_HEIGHT))
    }

    pub fn brightness(&self) -> f32 {
        self.display_cfg().brightness.unwrap_or(DEFAULT_BRIGHTNESS)
    }

    pub fn driver(&self) -> DriverKind {
        self.display_cfg().driver.unwrap_or_default()
    }

    pub fn clock_style(&self) -> ClockStyle {
        self.display_cfg().style.unwrap_or_default()
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.display_cfg().flush_interval_ms.unwrap_or(100))
    }

    pub fn zone(&self) -> Option<String> {
        self.time.as_ref().and_then(|t| t.zone.clone())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.time.as_ref().and_then(|t| t.poll_interval_ms).unwrap_or(10))
    }

    pub fn dst_resync(&self) -> bool {
        self.time.as_ref().and_then(|t| t.dst_resync).unwrap_or(false)
    }

    pub fn connect_policy(&self) -> ConnectPolicy {
        let net = self.network.clone().unwrap_or_default();
        ConnectPolicy {
            poll_interval: Duration::from_secs(net.connect_poll_secs.unwrap_or(1)),
            timeout: net.connect_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn probe_url(&self) -> String {
        self.network
            .as_ref()
            .and_then(|n| n.probe_url.clone())
            .unwrap_or_else(|| DEFAULT_PROBE_URL.to_string())
    }

    pub fn http_retries(&self) -> u8 {
        self.network.as_ref().and_then(|n| n.retries).unwrap_or(3)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.network.as_ref().and_then(|n| n.timeout_ms).unwrap_or(5000))
    }

    /// Route name to base URL.
    pub fn routes(&self) -> HashMap<String, String> {
        let services = self.services.clone().unwrap_or_default();
        HashMap::from([
            (ROUTE_TIME.to_string(), services.time_url.unwrap_or_else(|| DEFAULT_TIME_URL.to_string())),
            (ROUTE_WEATHER.to_string(), services.weather_url.unwrap_or_else(|| DEFAULT_WEATHER_URL.to_string())),
            (ROUTE_GEOIP.to_string(), self.geoip_url()),
        ])
    }

    pub fn geoip_url(&self) -> String {
        self.services
            .as_ref()
            .and_then(|s| s.geoip_url.clone())
            .unwrap_or_else(|| GEOIP_URL.to_string())
    }

    pub fn coordinates(&self) -> (Option<f64>, Option<f64>) {
        self.weather.as_ref().map_or((None, None), |w| (w.latitude, w.longitude))
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.weather.as_ref().and_then(|w| w.units).unwrap_or_default()
    }

    pub fn refresh_interval_mins(&self) -> u32 {
        self.weather
            .as_ref()
            .and_then(|w| w.refresh_interval_mins)
            .unwrap_or(DEFAULT_REFRESH_MINS)
    }
}
