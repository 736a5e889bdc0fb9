//! Poll cycle bookkeeping and the view-model it feeds

use crate::error::{Collection, FetchError, PollError};
use crate::models::{Device, Horse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Lifecycle of a single poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleState {
    Idle,
    Fetching,
    Succeeded,
    PartiallyFailed,
    Failed,
    Superseded,
}

/// What started a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    Schedule,
    Manual,
}

/// Emitted on every cycle state transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub sequence: u64,
    pub trigger: Trigger,
    pub state: CycleState,
    pub error: Option<PollError>,
}

/// Results of both collection fetches for one cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub horses: Result<Vec<Horse>, FetchError>,
    pub devices: Result<Vec<Device>, FetchError>,
}

impl CycleOutcome {
    pub fn state(&self) -> CycleState {
        match (&self.horses, &self.devices) {
            (Ok(_), Ok(_)) => CycleState::Succeeded,
            (Err(_), Err(_)) => CycleState::Failed,
            _ => CycleState::PartiallyFailed,
        }
    }

    /// Error to surface for this outcome; a total failure reports the horses error
    pub fn error(&self) -> Option<PollError> {
        match (&self.horses, &self.devices) {
            (Ok(_), Ok(_)) => None,
            (Err(e), Ok(_)) => Some(PollError::PartialFailure {
                failed: Collection::Horses,
                cause: e.clone(),
            }),
            (Ok(_), Err(e)) => Some(PollError::PartialFailure {
                failed: Collection::UnassignedDevices,
                cause: e.clone(),
            }),
            (Err(e), Err(_)) => Some(PollError::Fetch(e.clone())),
        }
    }
}

/// Observable state handed to the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub horses: Vec<Horse>,
    pub unassigned_devices: Vec<Device>,
    /// When any collection was last loaded successfully
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error banner from the latest applied cycle
    pub error: Option<PollError>,
    /// Issuance number of the cycle that produced this state
    pub sequence: u64,
    /// Bumped once per applied cycle
    pub revision: u64,
}

impl ViewModel {
    /// Fold a cycle outcome in. Collections that failed keep their
    /// last-known-good contents.
    pub fn apply(&mut self, sequence: u64, outcome: CycleOutcome, at: DateTime<Utc>) -> CycleState {
        let state = outcome.state();
        self.error = outcome.error();

        if let Ok(horses) = outcome.horses {
            self.horses = horses;
        }
        if let Ok(devices) = outcome.devices {
            self.unassigned_devices = devices;
        }
        if state != CycleState::Failed {
            self.fetched_at = Some(at);
        }

        self.sequence = sequence;
        self.revision += 1;
        state
    }

    pub fn horse(&self, horse_id: &str) -> Option<&Horse> {
        self.horses.iter().find(|h| h.horse_id == horse_id)
    }
}

/// How a completing cycle must be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Newest issued cycle; may update the view-model
    Current,
    /// A newer cycle was issued (or the poller stopped) before it completed
    Superseded,
    /// Already cancelled and reported
    Closed,
}

/// Monotonic issuance counter plus the set of cycles still outstanding
#[derive(Debug, Default)]
pub struct CycleLedger {
    issued: u64,
    /// Every sequence at or below this was cancelled by a stop
    floor: u64,
    open: BTreeMap<u64, Trigger>,
}

impl CycleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number a new cycle
    pub fn issue(&mut self, trigger: Trigger) -> u64 {
        self.issued += 1;
        self.open.insert(self.issued, trigger);
        self.issued
    }

    pub fn outstanding(&self) -> usize {
        self.open.len()
    }

    /// Close a completing cycle and decide whether its result may be shown
    pub fn settle(&mut self, sequence: u64) -> Settlement {
        if self.open.remove(&sequence).is_none() {
            return Settlement::Closed;
        }
        if sequence < self.issued || sequence <= self.floor {
            Settlement::Superseded
        } else {
            Settlement::Current
        }
    }

    /// Close a cycle whose task was aborted; returns its trigger if it was open
    pub fn cancel(&mut self, sequence: u64) -> Option<Trigger> {
        self.open.remove(&sequence)
    }

    /// Close every outstanding cycle and refuse any straggling completions
    pub fn cancel_all(&mut self) -> Vec<(u64, Trigger)> {
        self.floor = self.issued;
        std::mem::take(&mut self.open).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, HorseStatus};

    fn horse(id: &str) -> Horse {
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
            behavioral_insights: None,
        }
    }

    fn ok(ids: &[&str]) -> CycleOutcome {
        CycleOutcome {
            horses: Ok(ids.iter().map(|id| horse(id)).collect()),
            devices: Ok(Vec::new()),
        }
    }

    #[test]
    fn test_older_cycle_completing_late_is_superseded() {
        let mut ledger = CycleLedger::new();
        let mut view = ViewModel::default();

        let a = ledger.issue(Trigger::Schedule);
        let b = ledger.issue(Trigger::Manual);

        // B finishes first
        assert_eq!(ledger.settle(b), Settlement::Current);
        view.apply(b, ok(&["from-b"]), Utc::now());

        // A finishes afterwards and must not overwrite B
        assert_eq!(ledger.settle(a), Settlement::Superseded);
        assert_eq!(view.horses[0].horse_id, "from-b");
        assert_eq!(view.sequence, b);
        assert_eq!(view.revision, 1);
    }

    #[test]
    fn test_older_cycle_completing_first_is_still_superseded() {
        let mut ledger = CycleLedger::new();

        let a = ledger.issue(Trigger::Manual);
        let b = ledger.issue(Trigger::Manual);

        assert_eq!(ledger.settle(a), Settlement::Superseded);
        assert_eq!(ledger.settle(b), Settlement::Current);
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn test_settle_twice_is_closed() {
        let mut ledger = CycleLedger::new();
        let a = ledger.issue(Trigger::Schedule);

        assert_eq!(ledger.cancel(a), Some(Trigger::Schedule));
        assert_eq!(ledger.settle(a), Settlement::Closed);
        assert_eq!(ledger.cancel(a), None);
    }

    #[test]
    fn test_cancel_all_blocks_stragglers() {
        let mut ledger = CycleLedger::new();
        let a = ledger.issue(Trigger::Schedule);

        let cancelled = ledger.cancel_all();
        assert_eq!(cancelled, vec![(a, Trigger::Schedule)]);
        assert_eq!(ledger.settle(a), Settlement::Closed);

        // A cycle issued after the stop is live again
        let b = ledger.issue(Trigger::Manual);
        assert_eq!(ledger.settle(b), Settlement::Current);
    }

    #[test]
    fn test_partial_failure_keeps_last_known_devices() {
        let mut view = ViewModel::default();
        view.apply(
            1,
            CycleOutcome {
                horses: Ok(vec![horse("h1")]),
                devices: Ok(vec![Device {
                    device_id: "d1".to_string(),
                    assigned_horse_id: None,
                }]),
            },
            Utc::now(),
        );

        let state = view.apply(
            2,
            CycleOutcome {
                horses: Ok(vec![horse("h1"), horse("h2")]),
                devices: Err(FetchError::network("reset")),
            },
            Utc::now(),
        );

        assert_eq!(state, CycleState::PartiallyFailed);
        assert_eq!(view.horses.len(), 2);
        assert_eq!(view.unassigned_devices.len(), 1);
        assert_eq!(
            view.error,
            Some(PollError::PartialFailure {
                failed: Collection::UnassignedDevices,
                cause: FetchError::network("reset"),
            })
        );
    }

    #[test]
    fn test_total_failure_keeps_data_and_timestamp() {
        let mut view = ViewModel::default();
        let first = Utc::now();
        view.apply(1, ok(&["h1"]), first);

        let state = view.apply(
            2,
            CycleOutcome {
                horses: Err(FetchError::Timeout { timeout_ms: 12_000 }),
                devices: Err(FetchError::Http { status: 502 }),
            },
            Utc::now(),
        );

        assert_eq!(state, CycleState::Failed);
        assert_eq!(view.horses.len(), 1);
        assert_eq!(view.fetched_at, Some(first));
        assert_eq!(
            view.error,
            Some(PollError::Fetch(FetchError::Timeout { timeout_ms: 12_000 }))
        );
        assert_eq!(view.revision, 2);
    }
}
