//! Append-only run history log.
//!
//! Every promotion attempt, decision, and outcome is recorded here for
//! audit and resume. The log is strictly append-only, keyed by run id
//! plus a per-run monotonic sequence number, and safe for concurrent
//! writers across different runs. A write failure must never pass
//! silently: the orchestrator treats it as fatal to the enclosing call.

use ascent_types::{AttemptOutcome, BundleId, FailureClass, RunId, RunStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// History log errors
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History write failed: {0}")]
    WriteFailed(String),

    #[error("History read failed: {0}")]
    ReadFailed(String),
}

/// One transition in a promotion run's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run was created for a bundle
    RunCreated { bundle_id: BundleId },
    /// An advance call began executing a stage
    StageStarted { stage: String, attempt: u32 },
    /// A single gate finished
    GateFinished {
        stage: String,
        gate: String,
        passed: bool,
        duration_ms: u64,
    },
    /// A stage attempt was recorded
    StageRecorded {
        stage: String,
        attempt: u32,
        outcome: AttemptOutcome,
    },
    /// The run transitioned to a new status
    StatusChanged {
        from: RunStatus,
        to: RunStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A remediation plan was attached to a failed attempt
    RemediationPlanned {
        stage: String,
        failure_class: FailureClass,
        retryable: bool,
    },
    /// The run was aborted by an operator
    Aborted { reason: String },
}

/// An event as durably recorded: run id, monotonic sequence, timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub run_id: RunId,
    /// Per-run monotonic sequence number, starting at 0
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: RunEvent,
}

/// Durable, append-only event log.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Append an event for a run. Must not fail silently.
    async fn append(&self, run_id: &RunId, event: RunEvent) -> Result<(), HistoryError>;

    /// All recorded events for a run, in sequence order.
    async fn events_for(&self, run_id: &RunId) -> Result<Vec<RecordedEvent>, HistoryError>;
}

/// In-memory history log for development and testing.
pub struct InMemoryHistoryLog {
    events: DashMap<RunId, Vec<RecordedEvent>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
        }
    }

    /// Total events recorded across all runs.
    pub fn total_count(&self) -> usize {
        self.events.iter().map(|e| e.len()).sum()
    }
}

impl Default for InMemoryHistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryLog for InMemoryHistoryLog {
    async fn append(&self, run_id: &RunId, event: RunEvent) -> Result<(), HistoryError> {
        let mut entry = self.events.entry(run_id.clone()).or_default();
        let sequence = entry.len() as u64;
        entry.push(RecordedEvent {
            run_id: run_id.clone(),
            sequence,
            recorded_at: Utc::now(),
            event,
        });
        Ok(())
    }

    async fn events_for(&self, run_id: &RunId) -> Result<Vec<RecordedEvent>, HistoryError> {
        Ok(self
            .events
            .get(run_id)
            .map(|e| e.clone())
            .unwrap_or_default())
    }
}

/// A log whose writes always fail. Used to test that the orchestrator
/// treats an unrecordable transition as fatal.
pub struct FailingHistoryLog;

#[async_trait]
impl HistoryLog for FailingHistoryLog {
    async fn append(&self, _run_id: &RunId, _event: RunEvent) -> Result<(), HistoryError> {
        Err(HistoryError::WriteFailed("log unavailable".to_string()))
    }

    async fn events_for(&self, _run_id: &RunId) -> Result<Vec<RecordedEvent>, HistoryError> {
        Err(HistoryError::ReadFailed("log unavailable".to_string()))
    }
}
