//! Services Layer
//!
//! Logic shared by the poller and the operator commands. Services talk to the
//! backend through [`HerdApi`](crate::api::HerdApi) and to local storage
//! through [`SqliteDb`](crate::db::sqlite::SqliteDb).
//!
//! # Services
//!
//! - `reconcile` - Coerce wire records into displayable horses and devices
//! - `AssignmentService` - Register a horse against an unassigned device
//! - `InsightsService` - Behavioural notes kept on this machine

pub mod assignment_service;
pub mod insights_service;
pub mod reconcile;

pub use assignment_service::{AssignmentForm, AssignmentResult, AssignmentService};
pub use insights_service::{InsightsResult, InsightsService};
