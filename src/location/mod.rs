//! Location resolver
//!
//! Supplies a best-effort operator position without blocking or crashing when
//! the platform has no location capability or the user declines permission.
//! The resolver never substitutes a fallback coordinate itself; callers pick
//! their own fallback (the poller uses its configured map centre).

mod reporter;
mod resolver;
mod sources;

pub use reporter::spawn_location_reporter;
pub use resolver::LocationResolver;
pub use sources::{FixedSource, IpLookupSource, PositionFeed, UnsupportedSource};

use crate::config::LocationConfig;
use crate::error::GeolocationError;
use crate::models::Position;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Sequence of readings produced by a platform source
pub type PositionUpdates = BoxStream<'static, Result<Position, GeolocationError>>;

/// Platform location capability.
///
/// Sources are callback-driven: the platform decides when a reading arrives.
/// Each call to `watch_position` opens a fresh sequence.
pub trait LocationSource: Send + Sync {
    /// False when the platform has no location API at all
    fn is_supported(&self) -> bool {
        true
    }

    fn watch_position(&self, options: &LocationOptions) -> PositionUpdates;
}

/// Hints passed to the platform when observation starts
#[derive(Debug, Clone, PartialEq)]
pub struct LocationOptions {
    /// Trade battery and latency for precision
    pub high_accuracy: bool,
    /// Accept a cached reading up to this age; zero demands a fresh one
    pub max_reading_age: Duration,
    /// How long to wait for the first fix before reporting `Timeout`
    pub timeout: Duration,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            max_reading_age: Duration::ZERO,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Observable resolver state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationState {
    pub supported: bool,
    pub loading: bool,
    pub position: Option<Position>,
    pub error: Option<GeolocationError>,
}

impl Default for LocationState {
    fn default() -> Self {
        Self {
            supported: true,
            loading: true,
            position: None,
            error: None,
        }
    }
}

impl LocationState {
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            loading: false,
            position: None,
            error: Some(GeolocationError::Unsupported),
        }
    }
}

/// Which platform source the dashboard uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationProvider {
    /// No location capability
    #[default]
    None,
    /// Operator-declared coordinates
    Fixed,
    /// Network geolocation lookup
    Ip,
}

/// Build the configured source. Unusable settings degrade to
/// [`UnsupportedSource`] with a warning.
pub fn build_source(config: &LocationConfig) -> Arc<dyn LocationSource> {
    match config.provider {
        LocationProvider::None => Arc::new(UnsupportedSource),
        LocationProvider::Fixed => match (config.latitude, config.longitude) {
            (Some(lat), Some(lng)) if Position::new(lat, lng).coordinates().is_valid() => {
                Arc::new(FixedSource::new(Position::new(lat, lng)))
            }
            _ => {
                warn!("Fixed location provider needs valid latitude and longitude; location disabled");
                Arc::new(UnsupportedSource)
            }
        },
        LocationProvider::Ip => {
            match IpLookupSource::new(&config.ip_lookup_url, Duration::from_millis(config.ip_refresh_ms)) {
                Ok(source) => Arc::new(source),
                Err(e) => {
                    warn!("IP location provider unavailable: {}; location disabled", e);
                    Arc::new(UnsupportedSource)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_source_degrades_on_bad_fixed_config() {
        let config = LocationConfig {
            provider: LocationProvider::Fixed,
            latitude: Some(12.0),
            longitude: None,
            ..LocationConfig::default()
        };
        assert!(!build_source(&config).is_supported());

        let config = LocationConfig {
            provider: LocationProvider::Fixed,
            latitude: Some(52.1),
            longitude: Some(5.3),
            ..LocationConfig::default()
        };
        assert!(build_source(&config).is_supported());
    }

    #[test]
    fn test_initial_state_is_loading() {
        let state = LocationState::default();
        assert!(state.loading);
        assert!(state.supported);
        assert_eq!(state.position, None);
    }
}
