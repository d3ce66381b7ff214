//! Promotion runs: the mutable unit of work.
//!
//! A [`PromotionRun`] tracks one end-to-end attempt to advance a bundle
//! through all targets: the resolved target snapshot, the current stage
//! index, and the append-only history of stage attempts. The run record
//! is owned exclusively by the orchestrator; gate runners and the
//! remediation planner return results that the orchestrator applies.

use crate::ids::{BundleId, RunId};
use crate::remediation::RemediationPlan;
use crate::target::EnvironmentTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a promotion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created, or ready for the next `advance` call
    Pending,
    /// An `advance` call is executing this stage's gates
    Validating,
    /// Gates passed; the stage index is being committed
    Advancing,
    /// A retryable failure occurred; awaiting an external retry trigger
    Blocked,
    /// Every stage passed (terminal)
    Succeeded,
    /// A stage exhausted its retry budget or failed unretryably (terminal)
    Failed,
    /// Explicitly halted by an operator (terminal)
    Aborted,
}

impl RunStatus {
    /// Terminal states are immutable; a new run must be created to retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Validating => write!(f, "validating"),
            RunStatus::Advancing => write!(f, "advancing"),
            RunStatus::Blocked => write!(f, "blocked"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Result of one gate execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    /// Name of the gate that ran
    pub gate_name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Captured diagnostic output, recorded regardless of outcome
    pub diagnostics: String,
    /// Wall-clock execution time in milliseconds
    pub duration_ms: u64,
}

/// Outcome of one stage attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// Every required gate passed
    Pass,
    /// At least one gate failed; never partial within a stage
    Fail,
    /// Stage was skipped (abort during execution)
    Skipped,
}

/// One recorded attempt at a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageAttempt {
    /// Name of the target this attempt ran against
    pub stage_name: String,
    /// 1-based attempt counter; retries increment, never overwrite
    pub attempt_number: u32,
    /// Gate results in execution order (stops at the first failure)
    pub gate_results: Vec<GateResult>,
    /// Attempt outcome
    pub outcome: AttemptOutcome,
    /// Remediation plan attached on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<RemediationPlan>,
    /// When the attempt was recorded
    pub recorded_at: DateTime<Utc>,
}

/// One end-to-end attempt to promote a bundle through all targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRun {
    /// Unique run identifier
    pub run_id: RunId,
    /// The bundle being promoted
    pub bundle_id: BundleId,
    /// Target ordering resolved from the registry at submit time;
    /// registry edits never affect an in-flight run
    pub targets: Vec<EnvironmentTarget>,
    /// Index of the stage the next `advance` call will execute
    pub current_stage_index: usize,
    /// Lifecycle state
    pub status: RunStatus,
    /// Append-only record of stage attempts
    pub history: Vec<StageAttempt>,
    /// Lineage reference to a prior (failed) run for the same bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_run: Option<RunId>,
    /// When the run was created
    pub started_at: DateTime<Utc>,
    /// When the run was last mutated
    pub updated_at: DateTime<Utc>,
}

impl PromotionRun {
    /// Create a new run at stage 0, status `Pending`.
    pub fn new(bundle_id: BundleId, targets: Vec<EnvironmentTarget>) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::generate(),
            bundle_id,
            targets,
            current_stage_index: 0,
            status: RunStatus::Pending,
            history: Vec::new(),
            prior_run: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn with_prior_run(mut self, prior: RunId) -> Self {
        self.prior_run = Some(prior);
        self
    }

    /// The target the next `advance` call will execute, if any remain.
    pub fn current_target(&self) -> Option<&EnvironmentTarget> {
        self.targets.get(self.current_stage_index)
    }

    /// Whether the current stage is the last one.
    pub fn on_last_stage(&self) -> bool {
        self.current_stage_index + 1 >= self.targets.len()
    }

    /// Attempt number the next attempt at the given stage would carry.
    pub fn next_attempt_number(&self, stage_name: &str) -> u32 {
        self.attempts_for(stage_name) + 1
    }

    /// Number of recorded attempts for a stage.
    pub fn attempts_for(&self, stage_name: &str) -> u32 {
        self.history
            .iter()
            .filter(|a| a.stage_name == stage_name)
            .count() as u32
    }

    /// Append a stage attempt (history is append-only).
    pub fn record_attempt(&mut self, attempt: StageAttempt) {
        self.history.push(attempt);
        self.touch();
    }

    /// Transition status and stamp `updated_at`.
    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.touch();
    }

    /// Commit a passed stage: move to the next index.
    pub fn advance_stage(&mut self) {
        self.current_stage_index += 1;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
