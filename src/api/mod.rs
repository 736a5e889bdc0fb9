//! Herd backend adapter module
//!
//! The backend (device assignment, horse registry, telemetry ingestion) is an
//! external collaborator. Everything in the crate talks to it through
//! [`HerdApi`], so the poller and services can be driven by test doubles.

pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::FetchError;
use async_trait::async_trait;
use types::*;

pub use http::HttpHerdApi;

/// Trait every herd backend client implements
#[async_trait]
pub trait HerdApi: Send + Sync {
    /// `GET {base}/horses`
    async fn fetch_horses(&self) -> Result<Vec<HorseRecord>, FetchError>;

    /// `GET {base}/unassigned`
    async fn fetch_unassigned_devices(&self) -> Result<Vec<DeviceRecord>, FetchError>;

    /// `POST {base}/assign-horse`
    async fn assign_horse(&self, request: &AssignHorseRequest) -> Result<(), FetchError>;

    /// `POST {base}/location`
    async fn report_location(&self, report: LocationReport) -> Result<(), FetchError>;
}
