//! Interval-driven poller for the two herd collections

use super::cycle::{CycleLedger, CycleOutcome, CycleReport, CycleState, Settlement, Trigger, ViewModel};
use super::PollerConfig;
use crate::api::types::{DeviceRecord, HorseRecord};
use crate::api::HerdApi;
use crate::error::{FetchError, PollError};
use crate::location::LocationState;
use crate::models::Coordinates;
use crate::services::reconcile::{reconcile_devices, reconcile_horses};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const REPORT_CAPACITY: usize = 64;

/// Polls `horses` and `unassigned devices` and publishes a [`ViewModel`].
///
/// Must be used from within a Tokio runtime. Dropping the poller stops it.
pub struct TelemetryPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    api: Arc<dyn HerdApi>,
    location: Option<watch::Receiver<LocationState>>,
    config: RwLock<PollerConfig>,
    ledger: Mutex<CycleLedger>,
    view_tx: watch::Sender<ViewModel>,
    report_tx: broadcast::Sender<CycleReport>,
    /// The newest cycle's task; older ones are aborted when it is replaced
    in_flight: Mutex<Option<(u64, Trigger, JoinHandle<()>)>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryPoller {
    /// Create an idle poller. `location`, when given, is read at fetch time to
    /// place horses that arrive without coordinates.
    pub fn new(api: Arc<dyn HerdApi>, location: Option<watch::Receiver<LocationState>>) -> Self {
        let (view_tx, _) = watch::channel(ViewModel::default());
        let (report_tx, _) = broadcast::channel(REPORT_CAPACITY);

        Self {
            inner: Arc::new(PollerInner {
                api,
                location,
                config: RwLock::new(PollerConfig::default()),
                ledger: Mutex::new(CycleLedger::new()),
                view_tx,
                report_tx,
                in_flight: Mutex::new(None),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Poll now and then every `config.interval`. Calling it again restarts
    /// the schedule with the new config.
    pub fn start(&self, config: PollerConfig) {
        let config = config.sanitized();
        let interval = config.interval;
        *self.inner.config.write() = config;

        let mut ticker = self.inner.ticker.lock();
        if let Some(previous) = ticker.take() {
            previous.abort();
        }

        let inner = Arc::clone(&self.inner);
        *ticker = Some(tokio::spawn(async move {
            let mut schedule = tokio::time::interval(interval);
            schedule.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                schedule.tick().await;
                inner.issue_cycle(Trigger::Schedule);
            }
        }));

        info!("Telemetry poller started (interval {:?})", interval);
    }

    /// Cancel the schedule and any in-flight cycle. Idempotent.
    pub fn stop(&self) {
        let ticker = self.inner.ticker.lock().take();
        let was_running = ticker.is_some();
        if let Some(ticker) = ticker {
            ticker.abort();
        }

        if let Some((_, _, handle)) = self.inner.in_flight.lock().take() {
            handle.abort();
        }

        let cancelled = self.inner.ledger.lock().cancel_all();
        for (sequence, trigger) in cancelled {
            debug!("Cycle {} cancelled by stop", sequence);
            self.inner.report(sequence, trigger, CycleState::Superseded, None);
        }

        if was_running {
            info!("Telemetry poller stopped");
        }
    }

    /// Fetch out of band without touching the schedule. Returns the new
    /// cycle's issuance number.
    pub fn refresh_now(&self) -> u64 {
        self.inner.issue_cycle(Trigger::Manual)
    }

    /// Handle that can trigger refreshes without owning the poller
    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.ticker.lock().is_some()
    }

    pub fn config(&self) -> PollerConfig {
        self.inner.config.read().clone()
    }

    /// Receiver for view-model updates
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.inner.view_tx.subscribe()
    }

    /// Receiver for per-cycle state transitions
    pub fn reports(&self) -> broadcast::Receiver<CycleReport> {
        self.inner.report_tx.subscribe()
    }

    /// Current view-model
    pub fn snapshot(&self) -> ViewModel {
        self.inner.view_tx.borrow().clone()
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Weak trigger for [`TelemetryPoller::refresh_now`]
#[derive(Clone)]
pub struct RefreshHandle {
    inner: Weak<PollerInner>,
}

impl RefreshHandle {
    /// Returns `None` once the poller has been dropped
    pub fn refresh_now(&self) -> Option<u64> {
        self.inner
            .upgrade()
            .map(|inner| inner.issue_cycle(Trigger::Manual))
    }
}

impl PollerInner {
    fn issue_cycle(self: &Arc<Self>, trigger: Trigger) -> u64 {
        let mut in_flight = self.in_flight.lock();

        let sequence = self.ledger.lock().issue(trigger);
        self.report(sequence, trigger, CycleState::Fetching, None);
        debug!("Cycle {} issued ({:?})", sequence, trigger);

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.run_cycle(sequence, trigger).await });

        if let Some((previous, previous_trigger, previous_handle)) =
            in_flight.replace((sequence, trigger, handle))
        {
            previous_handle.abort();
            if self.ledger.lock().cancel(previous).is_some() {
                debug!("Cycle {} superseded by {}", previous, sequence);
                self.report(previous, previous_trigger, CycleState::Superseded, None);
            }
        }

        sequence
    }

    async fn run_cycle(self: Arc<Self>, sequence: u64, trigger: Trigger) {
        let config = self.config.read().clone();
        let reference = self.reference_position(&config);

        let (horses, devices) = tokio::join!(
            bounded(config.request_timeout, self.api.fetch_horses()),
            bounded(config.request_timeout, self.api.fetch_unassigned_devices()),
        );

        let outcome = reconcile_outcome(horses, devices, reference, config.jitter_degrees);
        self.complete(sequence, trigger, outcome);
    }

    fn complete(&self, sequence: u64, trigger: Trigger, outcome: CycleOutcome) {
        if let (Err(horses), Err(devices)) = (&outcome.horses, &outcome.devices) {
            warn!(
                "Cycle {} failed: horses: {}; unassigned devices: {}",
                sequence, horses, devices
            );
        }

        let (state, error) = {
            let mut ledger = self.ledger.lock();
            match ledger.settle(sequence) {
                Settlement::Closed => return,
                Settlement::Superseded => (CycleState::Superseded, None),
                Settlement::Current => {
                    let error = outcome.error();
                    let mut state = CycleState::Idle;
                    self.view_tx.send_modify(|view| {
                        state = view.apply(sequence, outcome, Utc::now());
                    });
                    (state, error)
                }
            }
        };

        match (&state, &error) {
            (CycleState::PartiallyFailed, Some(e)) => warn!("Cycle {}: {}", sequence, e),
            (CycleState::Superseded, _) => debug!("Cycle {} superseded on completion", sequence),
            _ => debug!("Cycle {} finished: {:?}", sequence, state),
        }
        self.report(sequence, trigger, state, error);

        let mut in_flight = self.in_flight.lock();
        if matches!(in_flight.as_ref(), Some((current, _, _)) if *current == sequence) {
            in_flight.take();
        }
    }

    fn reference_position(&self, config: &PollerConfig) -> Coordinates {
        self.location
            .as_ref()
            .and_then(|rx| rx.borrow().position)
            .map(|p| p.coordinates())
            .filter(|c| c.is_valid())
            .unwrap_or_else(|| config.fallback_position.coordinates())
    }

    fn report(&self, sequence: u64, trigger: Trigger, state: CycleState, error: Option<PollError>) {
        // No subscribers is fine
        let _ = self.report_tx.send(CycleReport {
            sequence,
            trigger,
            state,
            error,
        });
    }
}

async fn bounded<T, F>(limit: Duration, request: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
    match tokio::time::timeout(limit, request).await {
        Ok(Err(FetchError::Timeout { .. })) | Err(_) => Err(FetchError::Timeout { timeout_ms }),
        Ok(result) => result,
    }
}

fn reconcile_outcome(
    horses: Result<Vec<HorseRecord>, FetchError>,
    devices: Result<Vec<DeviceRecord>, FetchError>,
    reference: Coordinates,
    jitter_degrees: f64,
) -> CycleOutcome {
    let mut rng = rand::thread_rng();
    CycleOutcome {
        horses: horses.map(|records| reconcile_horses(records, reference, jitter_degrees, &mut rng)),
        devices: devices.map(reconcile_devices),
    }
}
