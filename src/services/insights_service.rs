//! Insights Service
//!
//! Free-text behavioural notes an operator keeps per horse. Notes live only on
//! this machine and take precedence over the backend's `behavioralInsights`.

use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use crate::models::Horse;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Notes for one horse
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResult {
    pub horse_id: String,
    pub insights: Option<String>,
}

/// Insights service for business logic
pub struct InsightsService;

impl InsightsService {
    pub fn get(db: &SqliteDb, horse_id: &str) -> Result<InsightsResult> {
        let horse_id = Self::require_id(horse_id)?;
        Ok(InsightsResult {
            insights: db.get_insights(horse_id)?,
            horse_id: horse_id.to_string(),
        })
    }

    /// Save notes; blank text clears them
    pub fn save(db: &SqliteDb, horse_id: &str, text: &str) -> Result<InsightsResult> {
        let horse_id = Self::require_id(horse_id)?;
        if text.trim().is_empty() {
            Self::clear(db, horse_id)?;
            return Ok(InsightsResult {
                horse_id: horse_id.to_string(),
                insights: None,
            });
        }

        db.save_insights(horse_id, text)?;
        info!("Saved insights for horse {}", horse_id);
        Ok(InsightsResult {
            horse_id: horse_id.to_string(),
            insights: Some(text.to_string()),
        })
    }

    /// Returns whether any notes existed
    pub fn clear(db: &SqliteDb, horse_id: &str) -> Result<bool> {
        let horse_id = Self::require_id(horse_id)?;
        let existed = db.clear_insights(horse_id)?;
        if existed {
            info!("Cleared insights for horse {}", horse_id);
        }
        Ok(existed)
    }

    /// Overlay saved notes onto freshly reconciled horses. A storage failure
    /// leaves the remote notes in place.
    pub fn apply_saved(db: &SqliteDb, horses: &mut [Horse]) {
        for horse in horses.iter_mut() {
            match db.get_insights(&horse.horse_id) {
                Ok(Some(notes)) => {
                    debug!("Using saved insights for horse {}", horse.horse_id);
                    horse.behavioral_insights = Some(notes);
                }
                Ok(None) => {}
                Err(e) => warn!("Could not read insights for horse {}: {}", horse.horse_id, e),
            }
        }
    }

    fn require_id(horse_id: &str) -> Result<&str> {
        let horse_id = horse_id.trim();
        if horse_id.is_empty() {
            return Err(AppError::Validation("horse id is required".to_string()));
        }
        Ok(horse_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, HorseStatus};

    fn horse(id: &str, remote_notes: Option<&str>) -> Horse {
        Horse {
            horse_id: id.to_string(),
            name: id.to_string(),
            location: String::new(),
            status: HorseStatus::Normal,
            heart_rate: None,
            temperature: None,
            speed: None,
            oxygen_saturation: None,
            coordinates: Coordinates { lat: 0.0, lng: 0.0 },
            coordinates_synthesized: false,
            last_updated: None,
            behavioral_insights: remote_notes.map(str::to_string),
        }
    }

    #[test]
    fn test_save_get_clear() {
        let db = SqliteDb::in_memory().unwrap();

        assert_eq!(InsightsService::get(&db, "h1").unwrap().insights, None);

        InsightsService::save(&db, "h1", "Restless after feeding").unwrap();
        assert_eq!(
            InsightsService::get(&db, " h1 ").unwrap().insights.as_deref(),
            Some("Restless after feeding")
        );

        assert!(InsightsService::clear(&db, "h1").unwrap());
        assert!(!InsightsService::clear(&db, "h1").unwrap());
        assert_eq!(InsightsService::get(&db, "h1").unwrap().insights, None);
    }

    #[test]
    fn test_blank_text_clears_and_blank_id_rejected() {
        let db = SqliteDb::in_memory().unwrap();
        InsightsService::save(&db, "h1", "Limping").unwrap();

        let result = InsightsService::save(&db, "h1", "   ").unwrap();
        assert_eq!(result.insights, None);
        assert_eq!(db.get_insights("h1").unwrap(), None);

        assert!(matches!(
            InsightsService::get(&db, "  "),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_saved_notes_override_remote() {
        let db = SqliteDb::in_memory().unwrap();
        InsightsService::save(&db, "h2", "Prefers the north paddock").unwrap();

        let mut horses = vec![horse("h1", Some("remote h1")), horse("h2", Some("remote h2"))];
        InsightsService::apply_saved(&db, &mut horses);

        assert_eq!(horses[0].behavioral_insights.as_deref(), Some("remote h1"));
        assert_eq!(
            horses[1].behavioral_insights.as_deref(),
            Some("Prefers the north paddock")
        );
    }
}
