/*
 *  transport.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Web transaction seam: named routes, connectivity wait, HTTP client
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

use std::collections::HashMap;
use std::future::Future;
use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use reqwest::{header, Client};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

pub const ROUTE_TIME: &str = "time";
pub const ROUTE_WEATHER: &str = "weather";
pub const ROUTE_GEOIP: &str = "geoip";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("no base URL configured for route '{0}'")]
    UnknownRoute(String),
    #[error("response body is not JSON: {0}")]
    Body(String),
    #[error("no connectivity after waiting {0:?}")]
    NotConnected(Duration),
}

/// Hook invoked on every connectivity poll, typically a loading animation.
pub trait Progress {
    fn tick(&mut self);
}

impl Progress for () {
    fn tick(&mut self) {}
}

/// Request/response access to remote services through named routes.
///
/// The caller names a route (`time`, `weather`) and a path, and gets the
/// service body back as JSON.
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    fn web_get(&self, route: &str, path: &str) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// How long and how often to wait for connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub poll_interval: Duration,
    /// `None` waits forever, matching a device that should never give up.
    pub timeout: Option<Duration>,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Poll `attempt` until it yields a value, ticking `progress` between polls.
pub async fn poll_until<P, F, Fut, R>(
    policy: &ConnectPolicy,
    progress: &mut P,
    mut attempt: F,
) -> Result<R, TransportError>
where
    P: Progress + Send + ?Sized,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Option<R>> + Send,
    R: Send,
{
    let started = Instant::now();
    loop {
        if let Some(ready) = attempt().await {
            return Ok(ready);
        }
        progress.tick();
        if let Some(limit) = policy.timeout {
            if started.elapsed() >= limit {
                return Err(TransportError::NotConnected(limit));
            }
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Wait for the link to come up, then issue `web_get`.
pub async fn web_request<T, P>(
    transport: &T,
    policy: &ConnectPolicy,
    route: &str,
    path: &str,
    progress: &mut P,
) -> Result<Value, TransportError>
where
    T: Transport + ?Sized,
    P: Progress + Send + ?Sized,
{
    poll_until(policy, progress, move || async move { transport.is_connected().await.then_some(()) }).await?;
    debug!("web.get route={} path={}", route, path);
    transport.web_get(route, path).await
}

/// HTTP implementation of [`Transport`]; routes map to base URLs.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    routes: HashMap<String, String>,
    probe_url: String,
    retries: u8,
}

impl HttpTransport {
    pub fn new(
        routes: HashMap<String, String>,
        probe_url: String,
        retries: u8,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept-Encoding", header::HeaderValue::from_static("gzip"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        info!("HTTP transport routes: {:?}", routes);
        Ok(Self {
            client,
            routes,
            probe_url,
            retries: retries.max(1),
        })
    }

    fn url_for(&self, route: &str, path: &str) -> Result<String, TransportError> {
        let base = self
            .routes
            .get(route)
            .ok_or_else(|| TransportError::UnknownRoute(route.to_string()))?;
        Ok(format!("{}{}", base.trim_end_matches('/'), path))
    }

    async fn send_with_retries(&self, url: &str) -> Result<String, TransportError> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(TransportError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    let raw = response.bytes().await?;
                    return Ok(decode_body(&raw));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retries {
                        return Err(TransportError::Http(e));
                    }
                    warn!("GET {} failed (attempt {}/{}): {}", url, attempt, self.retries, e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    async fn is_connected(&self) -> bool {
        match self.client.head(&self.probe_url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!("connectivity probe {} failed: {}", self.probe_url, e);
                false
            }
        }
    }

    async fn web_get(&self, route: &str, path: &str) -> Result<Value, TransportError> {
        let url = self.url_for(route, path)?;
        let plain = self.send_with_retries(&url).await?;
        serde_json::from_str(&plain).map_err(|e| TransportError::Body(e.to_string()))
    }
}

/// Gzip if it inflates, otherwise the bytes as text.
fn decode_body(raw: &[u8]) -> String {
    let mut decoder = GzDecoder::new(raw);
    let mut decoded = String::new();
    match decoder.read_to_string(&mut decoded) {
        Ok(_) => decoded,
        Err(_) => String::from_utf8_lossy(raw).to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CannedTransport;
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;
    use std::sync::atomic::Ordering;

    struct Counter(usize);

    impl Progress for Counter {
        fn tick(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_decode_body_plain_and_gzip() {
        assert_eq!(decode_body(br#"{"a":1}"#), r#"{"a":1}"#);

        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(br#"{"b":2}"#).unwrap();
        let gz = enc.finish().unwrap();
        assert_eq!(decode_body(&gz), r#"{"b":2}"#);
    }

    #[test]
    fn test_url_for_routes() {
        let mut routes = HashMap::new();
        routes.insert(ROUTE_TIME.to_string(), "https://timeapi.io/api/".to_string());
        let t = HttpTransport::new(routes, "https://timeapi.io".into(), 3, Duration::from_secs(2)).unwrap();
        assert_eq!(
            t.url_for(ROUTE_TIME, "/TimeZone/zone?timeZone=Europe/London").unwrap(),
            "https://timeapi.io/api/TimeZone/zone?timeZone=Europe/London"
        );
        assert!(matches!(t.url_for(ROUTE_WEATHER, "?x=1"), Err(TransportError::UnknownRoute(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_web_request_waits_for_link() {
        let transport = CannedTransport::with(ROUTE_TIME, json!({"ok": true}));
        transport.offline_polls.store(3, Ordering::SeqCst);
        let mut progress = Counter(0);

        let body = web_request(&transport, &ConnectPolicy::default(), ROUTE_TIME, "/x", &mut progress)
            .await
            .unwrap();

        assert_eq!(body, json!({"ok": true}));
        assert_eq!(progress.0, 3);
        assert_eq!(transport.request_count(ROUTE_TIME), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_web_request_times_out_when_bounded() {
        let transport = CannedTransport::with(ROUTE_TIME, json!({}));
        transport.offline_polls.store(usize::MAX, Ordering::SeqCst);
        let policy = ConnectPolicy {
            poll_interval: Duration::from_secs(1),
            timeout: Some(Duration::from_secs(5)),
        };

        let err = web_request(&transport, &policy, ROUTE_TIME, "/x", &mut ()).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(d) if d == Duration::from_secs(5)));
        assert_eq!(transport.request_count(ROUTE_TIME), 0);
    }
}
