//! Application state management

use crate::api::{HerdApi, HttpHerdApi};
use crate::config::DashboardConfig;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::location::{self, spawn_location_reporter, LocationResolver, LocationSource};
use crate::poller::{TelemetryPoller, ViewModel};
use crate::services::{AssignmentForm, AssignmentResult, AssignmentService, InsightsService};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Dashboard state shared across all commands.
///
/// Owns every long-lived subscription: the poller schedule, the location
/// observation and the backend position reporter. All of them are released
/// by [`Dashboard::shutdown`] or on drop.
pub struct Dashboard {
    pub config: DashboardConfig,

    /// Herd backend client
    pub api: Arc<dyn HerdApi>,

    /// Local notes database
    pub sqlite: Arc<SqliteDb>,

    pub poller: TelemetryPoller,

    pub resolver: LocationResolver,

    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl Dashboard {
    /// Build the dashboard from configuration
    pub fn new(config: DashboardConfig) -> Result<Self> {
        let api = Arc::new(HttpHerdApi::new(
            &config.api.base_url,
            &config.api.unassigned_path,
        )?);
        let sqlite = Arc::new(SqliteDb::new(&config.storage.database_path)?);
        let source = location::build_source(&config.location);

        Ok(Self::with_parts(config, api, sqlite, source))
    }

    /// Assemble from explicit collaborators
    pub fn with_parts(
        config: DashboardConfig,
        api: Arc<dyn HerdApi>,
        sqlite: Arc<SqliteDb>,
        source: Arc<dyn LocationSource>,
    ) -> Self {
        let resolver = LocationResolver::new(source, config.location.options());
        let poller = TelemetryPoller::new(api.clone(), Some(resolver.subscribe()));

        Self {
            config,
            api,
            sqlite,
            poller,
            resolver,
            reporter: Mutex::new(None),
        }
    }

    /// Start location observation, the poll schedule and, when enabled, the
    /// backend position reporter
    pub fn start(&self) {
        let location = self.resolver.observe();

        if self.config.location.report_to_backend {
            let mut reporter = self.reporter.lock();
            if reporter.is_none() {
                *reporter = Some(spawn_location_reporter(self.api.clone(), location));
            }
        }

        self.poller.start(self.config.polling.poller_config());
        info!("Dashboard started");
    }

    /// Release every subscription. Idempotent.
    pub fn shutdown(&self) {
        self.poller.stop();
        self.resolver.cancel();
        if let Some(reporter) = self.reporter.lock().take() {
            reporter.abort();
        }
    }

    /// Current view-model with locally saved notes applied
    pub fn view(&self) -> ViewModel {
        let mut view = self.poller.snapshot();
        InsightsService::apply_saved(&self.sqlite, &mut view.horses);
        view
    }

    /// Assign a horse and refresh on success
    pub async fn assign(&self, form: AssignmentForm) -> Result<AssignmentResult> {
        let refresh = self.poller.refresh_handle();
        AssignmentService::assign(self.api.as_ref(), Some(&refresh), form).await
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
