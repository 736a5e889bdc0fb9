//! Reconciled domain types shared by the poller, resolver and presentation layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health status reported for a horse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorseStatus {
    #[default]
    Normal,
    Attention,
    Critical,
}

impl HorseStatus {
    /// Parse a wire status. Anything that is neither normal nor attention is
    /// treated as critical, matching how the dashboard badges unknown states.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            None => HorseStatus::Normal,
            Some(s) if s.is_empty() || s == "normal" => HorseStatus::Normal,
            Some(s) if s == "attention" => HorseStatus::Attention,
            Some(_) => HorseStatus::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HorseStatus::Normal => "normal",
            HorseStatus::Attention => "attention",
            HorseStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HorseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HorseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(HorseStatus::Normal),
            "attention" => Ok(HorseStatus::Attention),
            "critical" => Ok(HorseStatus::Critical),
            other => Err(format!(
                "unknown status '{}' (expected normal, attention or critical)",
                other
            )),
        }
    }
}

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A horse after reconciliation. Always carries coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Horse {
    pub horse_id: String,
    pub name: String,
    pub location: String,
    pub status: HorseStatus,
    pub heart_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub speed: Option<f64>,
    pub oxygen_saturation: Option<f64>,
    pub coordinates: Coordinates,
    /// True when `coordinates` were synthesized around the reference position
    pub coordinates_synthesized: bool,
    pub last_updated: Option<String>,
    pub behavioral_insights: Option<String>,
}

/// A provisioned tracker that has no horse yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub assigned_horse_id: Option<String>,
}

/// A location reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    /// When the reading was taken, if the source knows
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            recorded_at: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_lenient() {
        assert_eq!(HorseStatus::parse_lenient(None), HorseStatus::Normal);
        assert_eq!(HorseStatus::parse_lenient(Some("")), HorseStatus::Normal);
        assert_eq!(HorseStatus::parse_lenient(Some("Attention")), HorseStatus::Attention);
        assert_eq!(HorseStatus::parse_lenient(Some("critical")), HorseStatus::Critical);
        assert_eq!(HorseStatus::parse_lenient(Some("lame")), HorseStatus::Critical);
    }

    #[test]
    fn test_status_from_str_rejects_unknown() {
        assert_eq!("NORMAL".parse::<HorseStatus>(), Ok(HorseStatus::Normal));
        assert!("sleepy".parse::<HorseStatus>().is_err());
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates { lat: 40.7, lng: -74.0 }.is_valid());
        assert!(!Coordinates { lat: f64::NAN, lng: 0.0 }.is_valid());
        assert!(!Coordinates { lat: 91.0, lng: 0.0 }.is_valid());
    }
}
