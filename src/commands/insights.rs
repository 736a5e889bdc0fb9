//! Behavioural insights commands

use crate::error::Result;
use crate::services::{InsightsResult, InsightsService};
use crate::state::Dashboard;

/// Get saved notes for a horse
pub fn get_insights(dashboard: &Dashboard, horse_id: &str) -> Result<InsightsResult> {
    InsightsService::get(&dashboard.sqlite, horse_id)
}

/// Save notes for a horse
pub fn save_insights(dashboard: &Dashboard, horse_id: &str, text: &str) -> Result<InsightsResult> {
    InsightsService::save(&dashboard.sqlite, horse_id, text)
}

/// Clear notes for a horse
pub fn clear_insights(dashboard: &Dashboard, horse_id: &str) -> Result<bool> {
    InsightsService::clear(&dashboard.sqlite, horse_id)
}
