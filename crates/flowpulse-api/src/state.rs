//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Core services are generic over the `EventStore` port; AppState pins them
//! to the file-backed store from `flowpulse-infra`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flowpulse_core::activity::ActivityTracker;
use flowpulse_core::aggregate::WorkflowAggregator;
use flowpulse_core::event::ProgressBus;
use flowpulse_core::health::BoxHealthProbe;
use flowpulse_core::status::StatusQueryService;
use flowpulse_infra::config::load_config;
use flowpulse_infra::filesystem::resolve_data_dir;
use flowpulse_infra::health::HttpDependencyProbe;
use flowpulse_infra::store::FileEventStore;
use flowpulse_infra::webhook::WebhookVerifier;
use flowpulse_types::config::{RuntimeProfile, ServiceConfig};

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteAggregator = WorkflowAggregator<FileEventStore>;

pub type ConcreteStatusService = StatusQueryService<FileEventStore>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<FileEventStore>,
    pub aggregator: Arc<ConcreteAggregator>,
    pub status_service: Arc<ConcreteStatusService>,
    pub verifier: Arc<WebhookVerifier>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, wire services and
    /// rebuild the aggregates from the event store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir, RuntimeProfile::current()).await?;
        tokio::fs::create_dir_all(&config.storage_root).await?;

        let state = Self::from_config(config, data_dir);
        state.aggregator.rebuild().await?;

        tracing::info!(
            storage_root = %state.store.root().display(),
            webhook_path = %state.config.webhook.webhook_path(),
            workflows = state.aggregator.len(),
            "application state initialized"
        );

        Ok(state)
    }

    /// Wire services from an already resolved configuration.
    ///
    /// Does not touch the filesystem; the aggregate cache starts empty.
    pub fn from_config(config: ServiceConfig, data_dir: PathBuf) -> Self {
        let store = Arc::new(FileEventStore::new(config.storage_root.clone()));
        let activity = Arc::new(ActivityTracker::new());
        let aggregator = Arc::new(WorkflowAggregator::new(
            store.clone(),
            ProgressBus::default(),
            activity,
        ));

        let mut status_service = StatusQueryService::new(
            aggregator.clone(),
            Duration::from_secs(config.health.stale_after_secs),
        );
        for check in &config.health.dependencies {
            status_service =
                status_service.with_probe(BoxHealthProbe::new(HttpDependencyProbe::from_check(check)));
        }

        let verifier = Arc::new(WebhookVerifier::from_config(&config.webhook));

        Self {
            config: Arc::new(config),
            store,
            aggregator,
            status_service: Arc::new(status_service),
            verifier,
            data_dir,
        }
    }

    /// Upper bound for verify + append + aggregate on one webhook.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.request_timeout_secs)
    }
}
