//! Assignment commands

use crate::error::Result;
use crate::poller::ViewModel;
use crate::services::{AssignmentForm, AssignmentResult};
use crate::state::Dashboard;
use std::time::Duration;

/// Assign a horse to a device, then wait for the refreshed device pool
pub async fn assign_horse(dashboard: &Dashboard, form: AssignmentForm) -> Result<AssignmentResult> {
    let mut views = dashboard.poller.subscribe();
    let result = dashboard.assign(form).await?;
    tracing::info!("{}", result.message);

    if let Some(sequence) = result.refresh_sequence {
        let wait = dashboard.poller.config().request_timeout + Duration::from_secs(1);
        match tokio::time::timeout(wait, refreshed(&mut views, sequence)).await {
            Ok(Some(view)) => tracing::info!(
                "{} unassigned device(s) remaining",
                view.unassigned_devices.len()
            ),
            _ => tracing::warn!("Refresh after assignment did not complete"),
        }
    }

    Ok(result)
}

async fn refreshed(
    views: &mut tokio::sync::watch::Receiver<ViewModel>,
    sequence: u64,
) -> Option<ViewModel> {
    loop {
        {
            let view = views.borrow_and_update();
            if view.sequence >= sequence {
                return Some(view.clone());
            }
        }
        views.changed().await.ok()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{device, ScriptedApi};
    use crate::db::sqlite::SqliteDb;
    use crate::location::UnsupportedSource;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_assign_waits_for_refreshed_pool() {
        let api = ScriptedApi::new();
        api.push_devices(Duration::ZERO, Ok(vec![device(json!({"deviceId": "trk-2"}))]));
        let dashboard = Dashboard::with_parts(
            Default::default(),
            api.clone(),
            Arc::new(SqliteDb::in_memory().unwrap()),
            Arc::new(UnsupportedSource),
        );

        let result = assign_horse(
            &dashboard,
            AssignmentForm {
                device_id: "trk-1".to_string(),
                name: "Comet".to_string(),
                ..AssignmentForm::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(result.device_id, "trk-1");
        assert_eq!(dashboard.poller.snapshot().unassigned_devices.len(), 1);
        assert_eq!(api.assigned.lock()[0].horse_details.name, "Comet");
    }
}
