use super::{LocationOptions, LocationSource, LocationState, PositionUpdates};
use crate::error::GeolocationError;
use crate::models::Position;
use chrono::Utc;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Best-effort operator position.
///
/// `observe` starts (or joins) a platform subscription and returns a receiver
/// that tracks [`LocationState`]. `cancel` releases the subscription; a later
/// `observe` starts a new one.
pub struct LocationResolver {
    source: Arc<dyn LocationSource>,
    options: LocationOptions,
    state: Arc<watch::Sender<LocationState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LocationResolver {
    pub fn new(source: Arc<dyn LocationSource>, options: LocationOptions) -> Self {
        let (state, _) = watch::channel(LocationState::default());
        Self {
            source,
            options,
            state: Arc::new(state),
            task: Mutex::new(None),
        }
    }

    /// Start observing. Calling again while a subscription is live joins it.
    pub fn observe(&self) -> watch::Receiver<LocationState> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return self.state.subscribe();
        }

        if !self.source.is_supported() {
            info!("Location capability not available");
            self.state.send_replace(LocationState::unsupported());
            return self.state.subscribe();
        }

        self.state.send_replace(LocationState::default());
        let updates = self.source.watch_position(&self.options);
        debug!(
            "Location observation started (high_accuracy={}, timeout={:?})",
            self.options.high_accuracy, self.options.timeout
        );
        let first_fix_deadline = Instant::now() + self.options.timeout;
        *task = Some(tokio::spawn(follow_updates(
            updates,
            first_fix_deadline,
            self.options.clone(),
            self.state.clone(),
        )));

        self.state.subscribe()
    }

    /// Release the platform subscription. Safe to call repeatedly and before
    /// the first reading arrives.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            self.state.send_if_modified(|s| {
                let was_loading = s.loading;
                s.loading = false;
                was_loading
            });
            debug!("Location observation cancelled");
        }
    }

    /// Receiver for the current state without starting observation
    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LocationState {
        self.state.borrow().clone()
    }

    pub fn is_observing(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for LocationResolver {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn follow_updates(
    mut updates: PositionUpdates,
    first_fix_deadline: Instant,
    options: LocationOptions,
    state: Arc<watch::Sender<LocationState>>,
) {
    // Stale readings do not count as a first fix
    loop {
        match tokio::time::timeout_at(first_fix_deadline, updates.next()).await {
            Err(_) => {
                warn!("No position fix within {:?}", options.timeout);
                publish(&state, Err(GeolocationError::Timeout), &options);
                break;
            }
            Ok(None) => {
                publish(&state, Err(GeolocationError::PositionUnavailable), &options);
                return;
            }
            Ok(Some(reading)) => {
                if publish(&state, reading, &options) {
                    break;
                }
            }
        }
    }

    while let Some(reading) = updates.next().await {
        publish(&state, reading, &options);
    }
    state.send_modify(|s| s.loading = false);
}

/// Apply one reading; false when it was dropped as stale
fn publish(
    state: &watch::Sender<LocationState>,
    reading: Result<Position, GeolocationError>,
    options: &LocationOptions,
) -> bool {
    match reading {
        Ok(position) if is_stale(&position, options.max_reading_age) => {
            debug!("Dropping stale position reading from {:?}", position.recorded_at);
            false
        }
        Ok(position) => {
            state.send_modify(|s| {
                s.position = Some(position);
                s.error = None;
                s.loading = false;
            });
            true
        }
        Err(e) => {
            info!("Location unavailable: {}", e);
            state.send_modify(|s| {
                s.position = None;
                s.error = Some(e);
                s.loading = false;
            });
            true
        }
    }
}

/// A reading is stale when a maximum age is set and the reading is older
fn is_stale(position: &Position, max_age: Duration) -> bool {
    if max_age.is_zero() {
        return false;
    }
    let (Some(recorded_at), Ok(max_age)) = (position.recorded_at, chrono::Duration::from_std(max_age)) else {
        return false;
    };
    Utc::now() - recorded_at > max_age
}
