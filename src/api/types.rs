//! Wire types for the herd backend REST contract
//!
//! The backend has shipped several envelope shapes over time, so every
//! collection accepts both `{ "<name>": [...] }` and a bare array, and every
//! record is decoded on its own so one bad entry cannot sink the collection.

use crate::models::HorseStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize a free-text field that may arrive as a string or a number
fn deserialize_flexible_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleText {
        Str(String),
        Int(i64),
        Float(f64),
        Other(Value),
    }

    match Option::<FlexibleText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FlexibleText::Str(s)) => Ok(Some(s)),
        Some(FlexibleText::Int(i)) => Ok(Some(i.to_string())),
        Some(FlexibleText::Float(f)) => Ok(Some(f.to_string())),
        Some(FlexibleText::Other(_)) => Ok(None),
    }
}

/// Horse record as sent by `GET /horses`
///
/// Identity, numeric and coordinate fields are kept raw; the reconciler
/// coerces them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorseRecord {
    #[serde(default)]
    pub horse_id: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    pub status: Option<String>,
    #[serde(default)]
    pub heart_rate: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub speed: Option<Value>,
    #[serde(default)]
    pub oxygen_saturation: Option<Value>,
    #[serde(default)]
    pub coordinates: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    pub last_updated: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    pub behavioral_insights: Option<String>,
}

/// Device record as sent by `GET /unassigned`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default)]
    pub device_id: Option<Value>,
    #[serde(default)]
    pub assigned_horse_id: Option<Value>,
}

/// `GET /horses` body
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HorsesEnvelope {
    Wrapped { horses: Vec<Value> },
    Bare(Vec<Value>),
}

impl HorsesEnvelope {
    pub fn into_records(self) -> Vec<HorseRecord> {
        let values = match self {
            HorsesEnvelope::Wrapped { horses } => horses,
            HorsesEnvelope::Bare(horses) => horses,
        };
        decode_each(values, "horse")
    }
}

/// `GET /unassigned` body
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DevicesEnvelope {
    Wrapped {
        #[serde(rename = "unassignedDevices", alias = "devices")]
        unassigned_devices: Vec<Value>,
    },
    Bare(Vec<Value>),
}

impl DevicesEnvelope {
    pub fn into_records(self) -> Vec<DeviceRecord> {
        let values = match self {
            DevicesEnvelope::Wrapped { unassigned_devices } => unassigned_devices,
            DevicesEnvelope::Bare(devices) => devices,
        };
        decode_each(values, "device")
    }
}

fn decode_each<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed {} record at index {}: {}", what, index, e);
                None
            }
        })
        .collect()
}

/// Horse details submitted with an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseDetails {
    pub name: String,
    pub location: String,
    pub status: HorseStatus,
}

/// `POST /assign-horse` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignHorseRequest {
    pub device_id: String,
    pub horse_details: HorseDetails,
}

/// `POST /location` body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub lat: f64,
    pub lng: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_horses_envelope_accepts_both_shapes() {
        let wrapped: HorsesEnvelope =
            serde_json::from_value(json!({ "horses": [{ "horseId": "h1" }] })).unwrap();
        assert_eq!(wrapped.into_records().len(), 1);

        let bare: HorsesEnvelope =
            serde_json::from_value(json!([{ "horseId": "h1" }, { "horseId": "h2" }])).unwrap();
        assert_eq!(bare.into_records().len(), 2);
    }

    #[test]
    fn test_devices_envelope_accepts_all_shapes() {
        let wrapped: DevicesEnvelope = serde_json::from_value(
            json!({ "unassignedDevices": [{ "deviceId": "d1", "assignedHorseId": null }] }),
        )
        .unwrap();
        assert_eq!(wrapped.into_records().len(), 1);

        let aliased: DevicesEnvelope =
            serde_json::from_value(json!({ "devices": [{ "deviceId": "d1" }] })).unwrap();
        assert_eq!(aliased.into_records().len(), 1);

        let bare: DevicesEnvelope = serde_json::from_value(json!([{ "deviceId": 7 }])).unwrap();
        assert_eq!(bare.into_records().len(), 1);
    }

    #[test]
    fn test_malformed_record_is_skipped_not_fatal() {
        let envelope: HorsesEnvelope = serde_json::from_value(json!({
            "horses": ["not an object", { "horseId": "h2", "name": "Storm" }]
        }))
        .unwrap();

        let records = envelope.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("Storm"));
    }

    #[test]
    fn test_flexible_text_fields() {
        let record: HorseRecord = serde_json::from_value(json!({
            "horseId": "h1",
            "name": 42,
            "lastUpdated": "5m ago",
            "location": { "pasture": 3 }
        }))
        .unwrap();

        assert_eq!(record.name.as_deref(), Some("42"));
        assert_eq!(record.last_updated.as_deref(), Some("5m ago"));
        assert_eq!(record.location, None);
    }

    #[test]
    fn test_assign_request_wire_shape() {
        let request = AssignHorseRequest {
            device_id: "dev-1".to_string(),
            horse_details: HorseDetails {
                name: "Thunder".to_string(),
                location: "Pasture 3".to_string(),
                status: HorseStatus::Attention,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "deviceId": "dev-1",
                "horseDetails": { "name": "Thunder", "location": "Pasture 3", "status": "attention" }
            })
        );
    }
}
