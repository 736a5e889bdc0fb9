use super::{LocationOptions, LocationSource, PositionUpdates};
use crate::error::{AppError, GeolocationError, Result};
use crate::models::Position;
use crate::services::reconcile::coerce_number;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Platform without any location capability
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSource;

impl LocationSource for UnsupportedSource {
    fn is_supported(&self) -> bool {
        false
    }

    fn watch_position(&self, _options: &LocationOptions) -> PositionUpdates {
        stream::empty().boxed()
    }
}

/// Operator-declared coordinates; yields one reading per observation
#[derive(Debug, Clone, Copy)]
pub struct FixedSource {
    position: Position,
}

impl FixedSource {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

impl LocationSource for FixedSource {
    fn watch_position(&self, _options: &LocationOptions) -> PositionUpdates {
        let position = self.position;
        stream::once(async move { Ok(position.recorded_at(Utc::now())) })
            .chain(stream::pending())
            .boxed()
    }
}

/// In-process bridge for hosts that deliver readings through callbacks.
///
/// Readings pushed while nobody observes are dropped.
pub struct PositionFeed {
    tx: broadcast::Sender<std::result::Result<Position, GeolocationError>>,
    requested: Mutex<Option<LocationOptions>>,
}

impl PositionFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            requested: Mutex::new(None),
        }
    }

    pub fn push(&self, position: Position) {
        let _ = self.tx.send(Ok(position));
    }

    pub fn fail(&self, error: GeolocationError) {
        let _ = self.tx.send(Err(error));
    }

    /// Options passed by the most recent observation
    pub fn requested_options(&self) -> Option<LocationOptions> {
        self.requested.lock().clone()
    }

    pub fn observers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for PositionFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSource for PositionFeed {
    fn watch_position(&self, options: &LocationOptions) -> PositionUpdates {
        *self.requested.lock() = Some(options.clone());
        let rx = self.tx.subscribe();

        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(reading) => return Some((reading, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Position feed lagged, skipped {} readings", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

/// Coarse position from a network geolocation lookup, refreshed periodically
pub struct IpLookupSource {
    client: reqwest::Client,
    url: String,
    refresh: Duration,
    last: Arc<Mutex<Option<Position>>>,
}

impl IpLookupSource {
    pub fn new(url: &str, refresh: Duration) -> Result<Self> {
        url::Url::parse(url).map_err(|e| AppError::Config(format!("invalid ip_lookup_url '{}': {}", url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            refresh: refresh.max(Duration::from_secs(1)),
            last: Arc::new(Mutex::new(None)),
        })
    }
}

struct LookupState {
    client: reqwest::Client,
    url: String,
    refresh: Duration,
    last: Arc<Mutex<Option<Position>>>,
    cached: Option<Position>,
    first: bool,
}

impl LocationSource for IpLookupSource {
    fn watch_position(&self, options: &LocationOptions) -> PositionUpdates {
        // A restart may reuse the previous lookup when it is young enough
        let cached = if options.max_reading_age.is_zero() {
            None
        } else {
            let max_age = chrono::Duration::from_std(options.max_reading_age).unwrap_or(chrono::Duration::zero());
            let last = *self.last.lock();
            last.filter(|p| p.recorded_at.is_some_and(|at| Utc::now() - at <= max_age))
        };

        let state = LookupState {
            client: self.client.clone(),
            url: self.url.clone(),
            refresh: self.refresh,
            last: self.last.clone(),
            cached,
            first: true,
        };

        stream::unfold(state, |mut state| async move {
            if state.first {
                state.first = false;
                if let Some(position) = state.cached.take() {
                    debug!("Reusing cached IP location");
                    return Some((Ok(position), state));
                }
            } else {
                tokio::time::sleep(state.refresh).await;
            }

            let reading = lookup(&state.client, &state.url).await;
            if let Ok(position) = &reading {
                *state.last.lock() = Some(*position);
            }
            Some((reading, state))
        })
        .boxed()
    }
}

async fn lookup(client: &reqwest::Client, url: &str) -> std::result::Result<Position, GeolocationError> {
    let response = client.get(url).send().await.map_err(|e| {
        warn!("IP location lookup failed: {}", e);
        GeolocationError::PositionUnavailable
    })?;

    if !response.status().is_success() {
        warn!("IP location lookup returned HTTP {}", response.status());
        return Err(GeolocationError::PositionUnavailable);
    }

    let body: Value = response.json().await.map_err(|e| {
        warn!("IP location lookup returned an unreadable body: {}", e);
        GeolocationError::PositionUnavailable
    })?;

    parse_lookup(&body)
        .map(|p| p.recorded_at(Utc::now()))
        .ok_or(GeolocationError::PositionUnavailable)
}

/// Accepts `{lat, lon}` and `{latitude, longitude}` bodies
fn parse_lookup(body: &Value) -> Option<Position> {
    if body.get("status").and_then(Value::as_str) == Some("fail") {
        return None;
    }
    let lat = coerce_number(body.get("lat").or_else(|| body.get("latitude")))?;
    let lng = coerce_number(
        body.get("lon")
            .or_else(|| body.get("lng"))
            .or_else(|| body.get("longitude")),
    )?;

    let position = Position::new(lat, lng);
    position.coordinates().is_valid().then_some(position)
}
