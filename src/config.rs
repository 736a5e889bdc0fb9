//! Dashboard configuration
//!
//! Loaded from `herd-monitor.toml`. Every section and field has a default, and
//! a missing or malformed file falls back to defaults with a warning.

use crate::error::Result;
use crate::location::{LocationOptions, LocationProvider};
use crate::models::Position;
use crate::poller::PollerConfig;
use crate::services::reconcile::{DEFAULT_JITTER_DEGREES, DEFAULT_REFERENCE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "HERD_MONITOR_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub location: LocationConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub unassigned_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://horsetrackerbackend.onrender.com/api".to_string(),
            unassigned_path: "/unassigned".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub request_timeout_ms: u64,
    pub coordinate_jitter_deg: f64,
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            request_timeout_ms: 12_000,
            coordinate_jitter_deg: DEFAULT_JITTER_DEGREES,
            fallback_latitude: DEFAULT_REFERENCE.lat,
            fallback_longitude: DEFAULT_REFERENCE.lng,
        }
    }
}

impl PollingConfig {
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            jitter_degrees: self.coordinate_jitter_deg,
            fallback_position: Position::new(self.fallback_latitude, self.fallback_longitude),
        }
        .sanitized()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocationConfig {
    pub provider: LocationProvider,
    pub high_accuracy: bool,
    /// 0 demands a fresh reading every time
    pub max_reading_age_ms: u64,
    pub timeout_ms: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ip_lookup_url: String,
    pub ip_refresh_ms: u64,
    pub report_to_backend: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: LocationProvider::None,
            high_accuracy: true,
            max_reading_age_ms: 0,
            timeout_ms: 10_000,
            latitude: None,
            longitude: None,
            ip_lookup_url: "http://ip-api.com/json".to_string(),
            ip_refresh_ms: 300_000,
            report_to_backend: false,
        }
    }
}

impl LocationConfig {
    pub fn options(&self) -> LocationOptions {
        LocationOptions {
            high_accuracy: self.high_accuracy,
            max_reading_age: Duration::from_millis(self.max_reading_age_ms),
            timeout: Duration::from_millis(self.timeout_ms.max(1)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("herd-monitor.db"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "herd_monitor=info".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from an explicit path, `HERD_MONITOR_CONFIG`, or the default
    /// locations; falls back to defaults on any failure
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = explicit {
            candidates.push(path.to_path_buf());
        } else if let Ok(path) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        } else {
            candidates.push(PathBuf::from("config").join("herd-monitor.toml"));
            candidates.push(PathBuf::from("..").join("config").join("herd-monitor.toml"));
        }

        for path in &candidates {
            if !path.exists() {
                continue;
            }
            match Self::load(path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load {}: {}; using defaults", path.display(), e);
                    return Self::default();
                }
            }
        }

        if explicit.is_some() {
            warn!("Config file {:?} not found; using defaults", explicit);
        } else {
            info!("No config file found; using defaults");
        }
        Self::default()
    }

    /// Log a configuration summary
    pub fn log_summary(&self) {
        info!("API base URL: {}", self.api.base_url);
        info!(
            "Polling every {} ms (timeout {} ms)",
            self.polling.interval_ms, self.polling.request_timeout_ms
        );
        info!("Location provider: {:?}", self.location.provider);
        info!("Insights database: {}", self.storage.database_path.display());
    }
}
