//! Telemetry poller
//!
//! Keeps a view-model in sync with the `horses` and `unassigned devices`
//! collections. Cycles are numbered when issued; only the newest issued cycle
//! may update the view-model, whatever order completions arrive in.

mod cycle;
mod telemetry;

pub use cycle::{CycleLedger, CycleOutcome, CycleReport, CycleState, Settlement, Trigger, ViewModel};
pub use telemetry::{RefreshHandle, TelemetryPoller};

use crate::models::Position;
use crate::services::reconcile::{DEFAULT_JITTER_DEGREES, DEFAULT_REFERENCE};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// Poller settings
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Time between scheduled cycles
    pub interval: Duration,
    /// Bound on each collection fetch
    pub request_timeout: Duration,
    /// Jitter applied to synthesized coordinates, in degrees
    pub jitter_degrees: f64,
    /// Reference used for synthesized coordinates until a location is known
    pub fallback_position: Position,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            jitter_degrees: DEFAULT_JITTER_DEGREES,
            fallback_position: Position::new(DEFAULT_REFERENCE.lat, DEFAULT_REFERENCE.lng),
        }
    }
}

impl PollerConfig {
    /// Replace unusable values with defaults
    pub fn sanitized(mut self) -> Self {
        let defaults = PollerConfig::default();

        if self.interval.is_zero() {
            warn!("Poll interval of 0 is invalid, using {:?}", defaults.interval);
            self.interval = defaults.interval;
        }
        if self.request_timeout.is_zero() {
            warn!("Request timeout of 0 is invalid, using {:?}", defaults.request_timeout);
            self.request_timeout = defaults.request_timeout;
        }
        if !self.jitter_degrees.is_finite() || self.jitter_degrees < 0.0 {
            warn!("Coordinate jitter {} is invalid, using {}", self.jitter_degrees, defaults.jitter_degrees);
            self.jitter_degrees = defaults.jitter_degrees;
        }
        if !self.fallback_position.coordinates().is_valid() {
            warn!(
                "Fallback position ({}, {}) is invalid, using the default map centre",
                self.fallback_position.latitude, self.fallback_position.longitude
            );
            self.fallback_position = defaults.fallback_position;
        }

        self
    }
}
