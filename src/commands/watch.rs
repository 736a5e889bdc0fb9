//! Headless dashboard view
//!
//! Runs the poller and logs a card summary for every view-model revision.

use crate::error::{AppError, PollError, Result};
use crate::models::Horse;
use crate::poller::{CycleState, ViewModel};
use crate::state::Dashboard;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Run until Ctrl-C, or until the first applied cycle when `once` is set.
/// With `once`, a cycle that loaded nothing is returned as an error.
pub async fn watch(dashboard: &Dashboard, once: bool) -> Result<()> {
    let mut views = dashboard.poller.subscribe();
    let mut reports = dashboard.poller.reports();
    dashboard.start();

    let outcome = loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                views.borrow_and_update();
                let view = dashboard.view();
                for line in render_summary(&view) {
                    info!("{}", line);
                }
                if let Some(error) = &view.error {
                    warn!("Dashboard error: {}", error);
                }
                if once {
                    break match view.error {
                        Some(PollError::Fetch(e)) => Err(AppError::Fetch(e)),
                        _ => Ok(()),
                    };
                }
            }
            report = reports.recv() => match report {
                Ok(report) if report.state == CycleState::Superseded => {
                    debug!("Cycle {} ({:?}) superseded", report.sequence, report.trigger);
                }
                Ok(report) => debug!("Cycle {} ({:?}): {:?}", report.sequence, report.trigger, report.state),
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} cycle reports", skipped),
                Err(RecvError::Closed) => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break Ok(());
            }
        }
    };

    dashboard.shutdown();
    outcome
}

/// One line per horse, then the device pool, then any error banner
pub fn render_summary(view: &ViewModel) -> Vec<String> {
    let mut lines = Vec::with_capacity(view.horses.len() + 3);

    let fetched = view
        .fetched_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    lines.push(format!(
        "Herd: {} horse(s), last fetched {} (cycle {})",
        view.horses.len(),
        fetched,
        view.sequence
    ));

    lines.extend(view.horses.iter().map(render_card));

    if view.unassigned_devices.is_empty() {
        lines.push("No unassigned devices".to_string());
    } else {
        let ids: Vec<&str> = view
            .unassigned_devices
            .iter()
            .map(|d| d.device_id.as_str())
            .collect();
        lines.push(format!("Unassigned devices: {}", ids.join(", ")));
    }

    if let Some(error) = &view.error {
        lines.push(format!("! {:?}: {}", error.kind(), error));
    }

    lines
}

fn render_card(horse: &Horse) -> String {
    let approx = if horse.coordinates_synthesized { " ~" } else { "" };
    format!(
        "{} [{}] HR {} BPM | Temp {}°C | Speed {} km/h ({}) | SpO2 {}% | {:.4},{:.4}{} | {} | updated {}",
        horse.name,
        horse.status,
        metric(horse.heart_rate),
        metric(horse.temperature),
        metric(horse.speed),
        activity(horse.speed),
        metric(horse.oxygen_saturation),
        horse.coordinates.lat,
        horse.coordinates.lng,
        approx,
        if horse.location.is_empty() { "Unknown" } else { horse.location.as_str() },
        horse.last_updated.as_deref().unwrap_or("--"),
    )
}

/// Missing speed counts as stationary
fn activity(speed: Option<f64>) -> &'static str {
    if speed.is_some_and(|s| s > 0.0) {
        "Moving"
    } else {
        "Stationary"
    }
}

fn metric(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v),
        Some(v) => format!("{:.1}", v),
        None => "--".to_string(),
    }
}
