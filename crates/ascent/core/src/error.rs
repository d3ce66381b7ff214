//! Orchestrator error types.

use ascent_types::{BundleId, RunId};
use thiserror::Error;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Bundle not found: {0}")]
    BundleNotFound(BundleId),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("An active run already exists for bundle {bundle_id}")]
    Conflict {
        bundle_id: BundleId,
        /// The conflicting run, when known; `None` while a racing submit
        /// is still creating it
        run_id: Option<RunId>,
    },

    #[error("Another advance is in flight for run {0}")]
    Busy(RunId),

    #[error("Invalid run state: {current}, expected one of: {expected:?}")]
    InvalidState {
        current: String,
        expected: Vec<String>,
    },

    #[error("History log error: {0}")]
    History(#[from] ascent_history::HistoryError),

    #[error("Artifact store error: {0}")]
    Artifact(ascent_registry::ArtifactStoreError),

    #[error("Run store error: {0}")]
    Store(#[from] crate::store::RunStoreError),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
