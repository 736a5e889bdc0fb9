use super::LocationState;
use crate::api::types::LocationReport;
use crate::api::HerdApi;
use crate::models::Position;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Forward each new operator position to the backend. Failures are logged
/// and never surface to the dashboard.
pub fn spawn_location_reporter(
    api: Arc<dyn HerdApi>,
    mut state: watch::Receiver<LocationState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_sent: Option<Position> = None;
        loop {
            let position = state.borrow_and_update().position;
            if let Some(position) = position.filter(|p| last_sent != Some(*p)) {
                let report = LocationReport {
                    lat: position.latitude,
                    lng: position.longitude,
                };
                match tokio::time::timeout(REPORT_TIMEOUT, api.report_location(report)).await {
                    Ok(Ok(())) => debug!("Reported operator location {:.4},{:.4}", report.lat, report.lng),
                    Ok(Err(e)) => warn!("Failed to report operator location: {}", e),
                    Err(_) => warn!("Reporting operator location timed out"),
                }
                last_sent = Some(position);
            }

            if state.changed().await.is_err() {
                break;
            }
        }
    })
}
