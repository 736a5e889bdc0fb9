//! Scripted [`HerdApi`] test double

use crate::api::types::*;
use crate::api::HerdApi;
use crate::error::FetchError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Scripted<T> = Mutex<VecDeque<(Duration, Result<T, FetchError>)>>;

/// Replays queued responses in call order; an empty queue answers with an
/// empty collection immediately.
#[derive(Default)]
pub struct ScriptedApi {
    horses: Scripted<Vec<HorseRecord>>,
    devices: Scripted<Vec<DeviceRecord>>,
    assign_results: Mutex<VecDeque<Result<(), FetchError>>>,
    pub assigned: Mutex<Vec<AssignHorseRequest>>,
    pub reported: Mutex<Vec<LocationReport>>,
    pub horse_calls: AtomicUsize,
    pub device_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_horses(&self, delay: Duration, result: Result<Vec<HorseRecord>, FetchError>) {
        self.horses.lock().push_back((delay, result));
    }

    pub fn push_devices(&self, delay: Duration, result: Result<Vec<DeviceRecord>, FetchError>) {
        self.devices.lock().push_back((delay, result));
    }

    pub fn push_assign_result(&self, result: Result<(), FetchError>) {
        self.assign_results.lock().push_back(result);
    }

    pub fn horse_calls(&self) -> usize {
        self.horse_calls.load(Ordering::SeqCst)
    }
}

pub fn horse(value: serde_json::Value) -> HorseRecord {
    serde_json::from_value(value).expect("valid horse record")
}

pub fn device(value: serde_json::Value) -> DeviceRecord {
    serde_json::from_value(value).expect("valid device record")
}

#[async_trait]
impl HerdApi for ScriptedApi {
    async fn fetch_horses(&self) -> Result<Vec<HorseRecord>, FetchError> {
        self.horse_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.horses.lock().pop_front();
        let (delay, result) = next.unwrap_or((Duration::ZERO, Ok(Vec::new())));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn fetch_unassigned_devices(&self) -> Result<Vec<DeviceRecord>, FetchError> {
        self.device_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.devices.lock().pop_front();
        let (delay, result) = next.unwrap_or((Duration::ZERO, Ok(Vec::new())));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn assign_horse(&self, request: &AssignHorseRequest) -> Result<(), FetchError> {
        self.assigned.lock().push(request.clone());
        self.assign_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn report_location(&self, report: LocationReport) -> Result<(), FetchError> {
        self.reported.lock().push(report);
        Ok(())
    }
}
