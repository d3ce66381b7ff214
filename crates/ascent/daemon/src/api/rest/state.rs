//! Application state for API handlers

use ascent_core::Orchestrator;
use ascent_gates::InMemoryApprovalLedger;
use ascent_registry::{ArtifactStore, EnvironmentRegistry};
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The promotion orchestrator
    pub orchestrator: Arc<Orchestrator>,

    /// Environment registry resolved at startup
    pub registry: Arc<EnvironmentRegistry>,

    /// Bundle artifact store
    pub artifacts: Arc<dyn ArtifactStore>,

    /// Approval ledger the manual-approval gates poll
    pub approvals: Arc<InMemoryApprovalLedger>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Graceful shutdown signal sender
    pub shutdown_tx: watch::Sender<bool>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        registry: Arc<EnvironmentRegistry>,
        artifacts: Arc<dyn ArtifactStore>,
        approvals: Arc<InMemoryApprovalLedger>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            artifacts,
            approvals,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
            shutdown_tx,
        }
    }
}
