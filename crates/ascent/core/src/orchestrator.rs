//! The promotion orchestrator: submit, advance, status, abort.
//!
//! `advance` is the step function. It executes the current stage's
//! gates strictly sequentially, converts any failure into a recorded
//! stage attempt plus a remediation plan, and never lets a gate failure
//! escape as an error. Infrastructure errors (`Busy`, `Conflict`,
//! `NotFound`, history-write failures) surface to the caller, who owns
//! retry policy for those.

use crate::error::{OrchestratorError, Result};
use crate::store::RunStore;
use ascent_gates::GateRunner;
use ascent_history::{HistoryLog, RecordedEvent, RunEvent};
use ascent_registry::{ArtifactStore, ArtifactStoreError, EnvironmentRegistry};
use ascent_types::{
    AttemptOutcome, BundleId, GateResult, PromotionRun, RemediationPlan, RunId, RunStatus,
    StageAttempt,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What one `advance` call concluded.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage passed; the run moved to the named next stage
    Advanced { next_stage: String },
    /// The final stage passed; the run is `Succeeded`
    Completed,
    /// A retryable failure; the caller should re-trigger after `retry_in`
    Blocked {
        plan: RemediationPlan,
        retry_in: Duration,
    },
    /// Retries exhausted or the failure is not retryable; terminal
    Failed { plan: RemediationPlan },
    /// The run was already terminal (or was aborted mid-call)
    AlreadyTerminal,
}

/// The promotion orchestrator.
///
/// Holds no per-run state between calls beyond the in-flight guard:
/// every operation re-reads the run record from the store, so a restart
/// resumes from the last durably recorded state without re-running
/// passed stages.
pub struct Orchestrator {
    artifacts: Arc<dyn ArtifactStore>,
    runs: Arc<dyn RunStore>,
    history: Arc<dyn HistoryLog>,
    gates: Arc<GateRunner>,
    /// Runs with an `advance` in flight; second callers get `Busy`
    in_flight: DashMap<RunId, ()>,
    /// Bundles with a `submit` in flight; closes the check-then-create race
    submitting: DashMap<BundleId, ()>,
    /// Cancellation senders for in-flight gate executions
    cancels: DashMap<RunId, watch::Sender<bool>>,
}

impl Orchestrator {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        runs: Arc<dyn RunStore>,
        history: Arc<dyn HistoryLog>,
        gates: Arc<GateRunner>,
    ) -> Self {
        Self {
            artifacts,
            runs,
            history,
            gates,
            in_flight: DashMap::new(),
            submitting: DashMap::new(),
            cancels: DashMap::new(),
        }
    }

    /// Create a promotion run for a bundle.
    ///
    /// Fails with [`OrchestratorError::Conflict`] if a non-terminal run
    /// already exists for the bundle, and with `BundleNotFound` if the
    /// artifact store has no such bundle. The registry's target ordering
    /// is resolved into the run here; later registry edits do not affect
    /// this run.
    pub async fn submit(
        &self,
        bundle_id: BundleId,
        registry: &EnvironmentRegistry,
    ) -> Result<RunId> {
        let _guard = MapGuard::acquire(&self.submitting, bundle_id.clone()).ok_or_else(|| {
            OrchestratorError::Conflict {
                bundle_id: bundle_id.clone(),
                run_id: None,
            }
        })?;

        self.artifacts.get(&bundle_id).await.map_err(|e| match e {
            ArtifactStoreError::NotFound(id) => OrchestratorError::BundleNotFound(id),
            other => OrchestratorError::Artifact(other),
        })?;

        if let Some(run_id) = self.runs.active_run_for_bundle(&bundle_id).await? {
            return Err(OrchestratorError::Conflict {
                bundle_id,
                run_id: Some(run_id),
            });
        }

        // Resubmission after a failed or aborted run links lineage to the
        // most recent terminal predecessor.
        let prior = self
            .runs
            .list()
            .await?
            .into_iter()
            .find(|r| r.bundle_id == bundle_id && r.status.is_terminal())
            .map(|r| r.run_id);

        let mut run = PromotionRun::new(bundle_id.clone(), registry.snapshot());
        if let Some(prior) = prior {
            run = run.with_prior_run(prior);
        }
        self.history
            .append(
                &run.run_id,
                RunEvent::RunCreated {
                    bundle_id: bundle_id.clone(),
                },
            )
            .await?;
        self.runs.save(&run).await?;

        tracing::info!(
            run_id = %run.run_id,
            bundle_id = %bundle_id,
            stages = run.targets.len(),
            "Promotion run created"
        );

        Ok(run.run_id)
    }

    /// Execute one stage attempt for a run.
    ///
    /// Serialized per run: a second concurrent call fails fast with
    /// [`OrchestratorError::Busy`] rather than blocking behind a slow
    /// gate. Every transition is appended to the history log; a history
    /// write failure fails the call before the state change is reported.
    pub async fn advance(&self, run_id: &RunId) -> Result<StageOutcome> {
        let _guard = MapGuard::acquire(&self.in_flight, run_id.clone())
            .ok_or_else(|| OrchestratorError::Busy(run_id.clone()))?;

        let mut run = self.get_run(run_id).await?;

        if run.status.is_terminal() {
            return Ok(StageOutcome::AlreadyTerminal);
        }

        let target = match run.current_target() {
            Some(target) => target.clone(),
            None => {
                return Err(OrchestratorError::InvalidState {
                    current: format!("stage index {} of {}", run.current_stage_index, run.targets.len()),
                    expected: vec!["an unfinished stage".to_string()],
                })
            }
        };
        let attempt_number = run.next_attempt_number(&target.name);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancels.insert(run_id.clone(), cancel_tx);

        let outcome = self
            .run_stage(&mut run, &target, attempt_number, cancel_rx)
            .await;

        self.cancels.remove(run_id);
        outcome
    }

    async fn run_stage(
        &self,
        run: &mut PromotionRun,
        target: &ascent_types::EnvironmentTarget,
        attempt_number: u32,
        cancel: watch::Receiver<bool>,
    ) -> Result<StageOutcome> {
        let bundle = self.artifacts.get(&run.bundle_id).await.map_err(|e| match e {
            ArtifactStoreError::NotFound(id) => OrchestratorError::BundleNotFound(id),
            other => OrchestratorError::Artifact(other),
        })?;

        self.history
            .append(
                &run.run_id,
                RunEvent::StageStarted {
                    stage: target.name.clone(),
                    attempt: attempt_number,
                },
            )
            .await?;
        self.transition(run, RunStatus::Validating, None).await?;
        self.runs.save(run).await?;

        tracing::info!(
            run_id = %run.run_id,
            stage = %target.name,
            attempt = attempt_number,
            gates = target.required_gates.len(),
            "Stage attempt started"
        );

        // Gates run strictly sequentially in declaration order; a later
        // gate only runs if every earlier one passed (fail-fast, cheap
        // checks first by convention).
        let mut gate_results: Vec<GateResult> = Vec::new();
        let mut failed_gate: Option<(GateResult, ascent_types::GateSpec)> = None;

        for gate in &target.required_gates {
            let result = self
                .gates
                .run(gate, target, &bundle, cancel.clone())
                .await;

            self.history
                .append(
                    &run.run_id,
                    RunEvent::GateFinished {
                        stage: target.name.clone(),
                        gate: result.gate_name.clone(),
                        passed: result.passed,
                        duration_ms: result.duration_ms,
                    },
                )
                .await?;

            let passed = result.passed;
            gate_results.push(result.clone());
            if !passed {
                failed_gate = Some((result, gate.clone()));
                break;
            }
        }

        // Abort landed while gates were running: record the interrupted
        // attempt and leave the terminal status set by `abort`.
        if *cancel.borrow() {
            self.record_attempt(
                run,
                target,
                attempt_number,
                gate_results,
                AttemptOutcome::Skipped,
                None,
            )
            .await?;
            run.set_status(RunStatus::Aborted);
            self.runs.save(run).await?;
            return Ok(StageOutcome::AlreadyTerminal);
        }

        match failed_gate {
            None => {
                self.apply_stage_pass(run, target, attempt_number, gate_results, &cancel)
                    .await
            }
            Some((result, gate)) => {
                self.apply_stage_fail(run, target, attempt_number, gate_results, result, gate, &cancel)
                    .await
            }
        }
    }

    /// Promotion is never partial within a stage: this only runs when
    /// every required gate passed.
    async fn apply_stage_pass(
        &self,
        run: &mut PromotionRun,
        target: &ascent_types::EnvironmentTarget,
        attempt_number: u32,
        gate_results: Vec<GateResult>,
        cancel: &watch::Receiver<bool>,
    ) -> Result<StageOutcome> {
        self.record_attempt(
            run,
            target,
            attempt_number,
            gate_results,
            AttemptOutcome::Pass,
            None,
        )
        .await?;

        self.transition(run, RunStatus::Advancing, None).await?;
        let was_last = run.on_last_stage();
        run.advance_stage();

        let outcome = if was_last {
            self.transition(run, RunStatus::Succeeded, None).await?;
            StageOutcome::Completed
        } else {
            self.transition(run, RunStatus::Pending, None).await?;
            StageOutcome::Advanced {
                next_stage: run
                    .current_target()
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
            }
        };

        // An abort that landed after the gate loop already saved a
        // terminal record; this save must not resurrect the run.
        if *cancel.borrow() {
            run.set_status(RunStatus::Aborted);
            self.runs.save(run).await?;
            return Ok(StageOutcome::AlreadyTerminal);
        }

        self.runs.save(run).await?;
        tracing::info!(
            run_id = %run.run_id,
            stage = %target.name,
            status = %run.status,
            "Stage passed"
        );
        Ok(outcome)
    }

    async fn apply_stage_fail(
        &self,
        run: &mut PromotionRun,
        target: &ascent_types::EnvironmentTarget,
        attempt_number: u32,
        gate_results: Vec<GateResult>,
        failed: GateResult,
        gate: ascent_types::GateSpec,
        cancel: &watch::Receiver<bool>,
    ) -> Result<StageOutcome> {
        let plan = ascent_remedy::plan(&failed, gate.kind);

        self.history
            .append(
                &run.run_id,
                RunEvent::RemediationPlanned {
                    stage: target.name.clone(),
                    failure_class: plan.failure_class,
                    retryable: plan.retryable,
                },
            )
            .await?;

        self.record_attempt(
            run,
            target,
            attempt_number,
            gate_results,
            AttemptOutcome::Fail,
            Some(plan.clone()),
        )
        .await?;

        let retries_left = attempt_number < gate.retry_policy.max_attempts;
        let outcome = if plan.retryable && retries_left {
            self.transition(
                run,
                RunStatus::Blocked,
                Some(format!("gate '{}' failed retryably", failed.gate_name)),
            )
            .await?;
            StageOutcome::Blocked {
                retry_in: gate.retry_policy.delay_for(attempt_number + 1),
                plan,
            }
        } else {
            self.transition(
                run,
                RunStatus::Failed,
                Some(format!(
                    "gate '{}' failed ({}), attempt {} of {}",
                    failed.gate_name, plan.failure_class, attempt_number, gate.retry_policy.max_attempts
                )),
            )
            .await?;
            StageOutcome::Failed { plan }
        };

        // Same guard as the pass path: never overwrite an abort that
        // raced in between the gate loop and this save.
        if *cancel.borrow() {
            run.set_status(RunStatus::Aborted);
            self.runs.save(run).await?;
            return Ok(StageOutcome::AlreadyTerminal);
        }

        self.runs.save(run).await?;
        tracing::warn!(
            run_id = %run.run_id,
            stage = %target.name,
            gate = %failed.gate_name,
            status = %run.status,
            "Stage failed"
        );
        Ok(outcome)
    }

    /// Last durably recorded snapshot of a run.
    pub async fn get_status(&self, run_id: &RunId) -> Result<PromotionRun> {
        self.get_run(run_id).await
    }

    /// Recorded history events for a run, in sequence order.
    pub async fn events(&self, run_id: &RunId) -> Result<Vec<RecordedEvent>> {
        self.get_run(run_id).await?;
        Ok(self.history.events_for(run_id).await?)
    }

    /// All known runs, newest first.
    pub async fn list_runs(&self) -> Result<Vec<PromotionRun>> {
        Ok(self.runs.list().await?)
    }

    /// Abort a run.
    ///
    /// Idempotent on terminal runs. An in-flight gate execution is
    /// cancelled cooperatively so its diagnostic record is still
    /// written.
    pub async fn abort(&self, run_id: &RunId, reason: impl Into<String>) -> Result<PromotionRun> {
        let reason = reason.into();
        let mut run = self.get_run(run_id).await?;

        if run.status.is_terminal() {
            return Ok(run);
        }

        if let Some(cancel) = self.cancels.get(run_id) {
            let _ = cancel.send(true);
        }

        self.history
            .append(
                run_id,
                RunEvent::Aborted {
                    reason: reason.clone(),
                },
            )
            .await?;
        self.transition(&mut run, RunStatus::Aborted, Some(reason))
            .await?;
        self.runs.save(&run).await?;

        tracing::info!(run_id = %run_id, "Run aborted");
        Ok(run)
    }

    async fn get_run(&self, run_id: &RunId) -> Result<PromotionRun> {
        self.runs
            .get(run_id)
            .await?
            .ok_or_else(|| OrchestratorError::RunNotFound(run_id.clone()))
    }

    async fn record_attempt(
        &self,
        run: &mut PromotionRun,
        target: &ascent_types::EnvironmentTarget,
        attempt_number: u32,
        gate_results: Vec<GateResult>,
        outcome: AttemptOutcome,
        remediation: Option<RemediationPlan>,
    ) -> Result<()> {
        self.history
            .append(
                &run.run_id,
                RunEvent::StageRecorded {
                    stage: target.name.clone(),
                    attempt: attempt_number,
                    outcome,
                },
            )
            .await?;
        run.record_attempt(StageAttempt {
            stage_name: target.name.clone(),
            attempt_number,
            gate_results,
            outcome,
            remediation,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    /// Append the status change to history, then apply it to the local
    /// record. History-first: an unrecordable transition never happens.
    async fn transition(
        &self,
        run: &mut PromotionRun,
        to: RunStatus,
        detail: Option<String>,
    ) -> Result<()> {
        self.history
            .append(
                &run.run_id,
                RunEvent::StatusChanged {
                    from: run.status,
                    to,
                    detail,
                },
            )
            .await?;
        run.set_status(to);
        Ok(())
    }

}

/// RAII occupancy guard over a DashMap key: `acquire` returns `None` if
/// the key is already held, and releases the key on drop.
struct MapGuard<'a, K: std::hash::Hash + Eq + Clone> {
    map: &'a DashMap<K, ()>,
    key: K,
}

impl<'a, K: std::hash::Hash + Eq + Clone> MapGuard<'a, K> {
    fn acquire(map: &'a DashMap<K, ()>, key: K) -> Option<Self> {
        match map.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(Self { map, key })
            }
        }
    }
}

impl<K: std::hash::Hash + Eq + Clone> Drop for MapGuard<'_, K> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}
