//! Reconciliation of raw backend records into view-ready domain types
//!
//! Numeric fields are coerced from number-or-string; anything that does not
//! parse to a finite number becomes `None`, never zero or NaN. Horses missing
//! coordinates get a position jittered around the reference position.

use crate::api::types::{DeviceRecord, HorseRecord};
use crate::models::{Coordinates, Device, Horse, HorseStatus};
use rand::Rng;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Default jitter applied to synthesized coordinates, in degrees
pub const DEFAULT_JITTER_DEGREES: f64 = 0.01;

/// Map centre used when no location reading is available yet
pub const DEFAULT_REFERENCE: Coordinates = Coordinates {
    lat: 40.7178,
    lng: -74.001,
};

/// Coerce a JSON number or numeric string into a finite f64
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Coerce a JSON string or integer into a non-empty identifier
pub fn coerce_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Read `{lat, lng}` or `{latitude, longitude}`, components number-or-string
pub fn coerce_coordinates(value: Option<&Value>) -> Option<Coordinates> {
    let object = value?.as_object()?;
    let lat = coerce_number(object.get("lat").or_else(|| object.get("latitude")))?;
    let lng = coerce_number(
        object
            .get("lng")
            .or_else(|| object.get("lon"))
            .or_else(|| object.get("longitude")),
    )?;

    let coordinates = Coordinates { lat, lng };
    coordinates.is_valid().then_some(coordinates)
}

/// Jitter around `reference`; always returns a finite, in-range pair
pub fn synthesize_coordinates<R: Rng>(
    reference: Coordinates,
    jitter_degrees: f64,
    rng: &mut R,
) -> Coordinates {
    let reference = if reference.is_valid() {
        reference
    } else {
        DEFAULT_REFERENCE
    };
    let jitter = if jitter_degrees.is_finite() && jitter_degrees > 0.0 {
        jitter_degrees
    } else {
        0.0
    };

    let mut offset = || {
        if jitter > 0.0 {
            rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        }
    };

    Coordinates {
        lat: (reference.lat + offset()).clamp(-90.0, 90.0),
        lng: (reference.lng + offset()).clamp(-180.0, 180.0),
    }
}

/// Turn raw horse records into horses with guaranteed coordinates.
///
/// Records without an identity are dropped; the first record wins for a
/// repeated `horseId`.
pub fn reconcile_horses<R: Rng>(
    records: Vec<HorseRecord>,
    reference: Coordinates,
    jitter_degrees: f64,
    rng: &mut R,
) -> Vec<Horse> {
    let mut seen = HashSet::new();
    let mut horses = Vec::with_capacity(records.len());

    for record in records {
        let Some(horse_id) = coerce_id(record.horse_id.as_ref()) else {
            warn!("Skipping horse record without horseId (name: {:?})", record.name);
            continue;
        };
        if !seen.insert(horse_id.clone()) {
            warn!("Skipping duplicate horse record {}", horse_id);
            continue;
        }

        let (coordinates, coordinates_synthesized) =
            match coerce_coordinates(record.coordinates.as_ref()) {
                Some(c) => (c, false),
                None => (synthesize_coordinates(reference, jitter_degrees, rng), true),
            };

        horses.push(Horse {
            name: record.name.unwrap_or_else(|| horse_id.clone()),
            horse_id,
            location: record.location.unwrap_or_default(),
            status: HorseStatus::parse_lenient(record.status.as_deref()),
            heart_rate: coerce_number(record.heart_rate.as_ref()),
            temperature: coerce_number(record.temperature.as_ref()),
            speed: coerce_number(record.speed.as_ref()),
            oxygen_saturation: coerce_number(record.oxygen_saturation.as_ref()),
            coordinates,
            coordinates_synthesized,
            last_updated: record.last_updated,
            behavioral_insights: record.behavioral_insights,
        });
    }

    horses
}

/// Turn raw device records into devices, dropping ones without a usable id
pub fn reconcile_devices(records: Vec<DeviceRecord>) -> Vec<Device> {
    let mut seen = HashSet::new();

    records
        .into_iter()
        .filter_map(|record| {
            let Some(device_id) = coerce_id(record.device_id.as_ref()) else {
                warn!("Skipping device record without deviceId");
                return None;
            };
            if !seen.insert(device_id.clone()) {
                return None;
            }
            Some(Device {
                device_id,
                assigned_horse_id: coerce_id(record.assigned_horse_id.as_ref()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn record(value: Value) -> HorseRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(Some(&json!(42))), Some(42.0));
        assert_eq!(coerce_number(Some(&json!("37.5"))), Some(37.5));
        assert_eq!(coerce_number(Some(&json!(" 98 "))), Some(98.0));
        assert_eq!(coerce_number(Some(&json!("fast"))), None);
        assert_eq!(coerce_number(Some(&json!("NaN"))), None);
        assert_eq!(coerce_number(Some(&json!("inf"))), None);
        assert_eq!(coerce_number(Some(&json!(true))), None);
        assert_eq!(coerce_number(Some(&Value::Null)), None);
        assert_eq!(coerce_number(None), None);
    }

    #[test]
    fn test_coerce_coordinates_shapes() {
        assert_eq!(
            coerce_coordinates(Some(&json!({ "lat": 40.7, "lng": -74.0 }))),
            Some(Coordinates { lat: 40.7, lng: -74.0 })
        );
        assert_eq!(
            coerce_coordinates(Some(&json!({ "latitude": "51.5", "longitude": "-0.12" }))),
            Some(Coordinates { lat: 51.5, lng: -0.12 })
        );
        assert_eq!(coerce_coordinates(Some(&json!({ "lat": 40.7 }))), None);
        assert_eq!(coerce_coordinates(Some(&json!({ "lat": 140.0, "lng": 0.0 }))), None);
        assert_eq!(coerce_coordinates(Some(&Value::Null)), None);
    }

    #[test]
    fn test_malformed_numbers_become_absent() {
        let mut rng = StdRng::seed_from_u64(1);
        let horses = reconcile_horses(
            vec![record(json!({
                "horseId": "h1",
                "heartRate": "42",
                "temperature": "warm",
                "speed": null,
                "oxygenSaturation": "NaN",
                "coordinates": { "lat": 40.0, "lng": -74.0 }
            }))],
            DEFAULT_REFERENCE,
            DEFAULT_JITTER_DEGREES,
            &mut rng,
        );

        let horse = &horses[0];
        assert_eq!(horse.heart_rate, Some(42.0));
        assert_eq!(horse.temperature, None);
        assert_eq!(horse.speed, None);
        assert_eq!(horse.oxygen_saturation, None);
        assert!(!horse.coordinates_synthesized);
    }

    #[test]
    fn test_missing_coordinates_are_synthesized_near_reference() {
        let mut rng = StdRng::seed_from_u64(7);
        let reference = Coordinates { lat: 51.5, lng: -0.12 };

        let horses = reconcile_horses(
            vec![
                record(json!({ "horseId": "h1", "coordinates": null })),
                record(json!({ "horseId": "h2" })),
                record(json!({ "horseId": "h3", "coordinates": { "lat": "north" } })),
            ],
            reference,
            0.01,
            &mut rng,
        );

        assert_eq!(horses.len(), 3);
        for horse in &horses {
            assert!(horse.coordinates_synthesized);
            assert!(horse.coordinates.is_valid());
            assert!((horse.coordinates.lat - reference.lat).abs() <= 0.01);
            assert!((horse.coordinates.lng - reference.lng).abs() <= 0.01);
        }
    }

    #[test]
    fn test_invalid_reference_falls_back_to_default() {
        let mut rng = StdRng::seed_from_u64(3);
        let coords = synthesize_coordinates(
            Coordinates { lat: f64::NAN, lng: 0.0 },
            f64::INFINITY,
            &mut rng,
        );
        assert_eq!(coords, DEFAULT_REFERENCE);
    }

    #[test]
    fn test_identity_rules() {
        let mut rng = StdRng::seed_from_u64(5);
        let horses = reconcile_horses(
            vec![
                record(json!({ "name": "Nameless" })),
                record(json!({ "horseId": 17, "name": "Thunder" })),
                record(json!({ "horseId": "17", "name": "Thunder again" })),
                record(json!({ "horseId": "  " })),
            ],
            DEFAULT_REFERENCE,
            DEFAULT_JITTER_DEGREES,
            &mut rng,
        );

        assert_eq!(horses.len(), 1);
        assert_eq!(horses[0].horse_id, "17");
        assert_eq!(horses[0].name, "Thunder");
        assert_eq!(horses[0].status, HorseStatus::Normal);
    }

    #[test]
    fn test_reconcile_devices() {
        let records: Vec<DeviceRecord> = serde_json::from_value(json!([
            { "deviceId": "d1", "assignedHorseId": null },
            { "deviceId": 2, "assignedHorseId": "h9" },
            { "assignedHorseId": "h3" },
            { "deviceId": "d1" }
        ]))
        .unwrap();

        let devices = reconcile_devices(records);
        assert_eq!(
            devices,
            vec![
                Device { device_id: "d1".to_string(), assigned_horse_id: None },
                Device { device_id: "2".to_string(), assigned_horse_id: Some("h9".to_string()) },
            ]
        );
    }
}
