//! Herd Monitor - live horse telemetry dashboard client
//!
//! Polls the herd backend for horse telemetry and the unassigned tracker
//! pool, reconciles both into a view-model, resolves the operator's position
//! for map placement, and keeps free-text behavioural notes locally.

pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod location;
pub mod models;
pub mod poller;
pub mod services;
pub mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // A subscriber may already be installed (tests, embedding hosts)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
