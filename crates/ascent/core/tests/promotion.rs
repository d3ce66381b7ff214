//! End-to-end promotion scenarios against in-memory collaborators.

use ascent_core::{InMemoryRunStore, Orchestrator, OrchestratorError, RunStore, StageOutcome};
use ascent_gates::{
    ApprovalDecision, ApprovalLedger, GateRunner, HarnessReport, InMemoryApprovalLedger,
    ScriptedTestHarness, StaticSecretProvider, TestHarness,
};
use ascent_history::{
    FailingHistoryLog, HistoryError, HistoryLog, InMemoryHistoryLog, RecordedEvent, RunEvent,
};
use ascent_registry::{ArtifactStore, EnvironmentRegistry, InMemoryArtifactStore};
use ascent_types::{
    AttemptOutcome, Bundle, EnvironmentTarget, FailureClass, GateKind, GateSpec, RetryPolicy,
    RunId, RunStatus,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Fixture {
    artifacts: Arc<InMemoryArtifactStore>,
    runs: Arc<InMemoryRunStore>,
    harness: Arc<ScriptedTestHarness>,
    approvals: Arc<InMemoryApprovalLedger>,
    orchestrator: Arc<Orchestrator>,
}

fn make_fixture() -> Fixture {
    make_fixture_with_history(Arc::new(InMemoryHistoryLog::new()))
}

fn make_fixture_with_history(history: Arc<dyn HistoryLog>) -> Fixture {
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let runs = Arc::new(InMemoryRunStore::new());
    let harness = Arc::new(ScriptedTestHarness::new());
    let approvals = Arc::new(InMemoryApprovalLedger::new());

    let gates = Arc::new(GateRunner::new(
        Arc::clone(&harness) as Arc<dyn TestHarness>,
        Arc::clone(&approvals) as Arc<dyn ApprovalLedger>,
        Arc::new(StaticSecretProvider::new()),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&artifacts) as Arc<dyn ArtifactStore>,
        Arc::clone(&runs) as Arc<dyn RunStore>,
        history,
        gates,
    ));

    Fixture {
        artifacts,
        runs,
        harness,
        approvals,
        orchestrator,
    }
}

async fn store_bundle(fixture: &Fixture) -> Bundle {
    let mut params = BTreeMap::new();
    params.insert("workspace".to_string(), "dev-ws".to_string());
    let bundle = Bundle::new("rev-abc", params);
    fixture.artifacts.put(bundle.clone()).await.unwrap();
    bundle
}

fn syntax_gate(name: &str) -> GateSpec {
    GateSpec::new(name, GateKind::SyntaxCheck, Duration::from_secs(5))
}

fn test_gate(name: &str, policy: RetryPolicy) -> GateSpec {
    GateSpec::new(name, GateKind::TestSuite, Duration::from_secs(5)).with_retry_policy(policy)
}

/// dev(1 gate), staging(2 gates), prod(1 gate) — all passing.
fn three_stage_registry() -> EnvironmentRegistry {
    EnvironmentRegistry::new(vec![
        EnvironmentTarget::new("dev", 1).with_gate(syntax_gate("dev-lint")),
        EnvironmentTarget::new("staging", 2)
            .with_gate(syntax_gate("staging-lint"))
            .with_gate(test_gate("staging-tests", RetryPolicy::default())),
        EnvironmentTarget::new("prod", 3).with_gate(syntax_gate("prod-lint")),
    ])
    .unwrap()
}

#[tokio::test]
async fn happy_path_promotes_through_all_stages() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    let registry = three_stage_registry();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Advanced { ref next_stage } if next_stage == "staging"));

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Advanced { ref next_stage } if next_stage == "prod"));

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Completed));

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.current_stage_index, 3);
    assert_eq!(run.history.len(), 3);
    assert!(run
        .history
        .iter()
        .all(|a| a.outcome == AttemptOutcome::Pass));
}

#[tokio::test]
async fn stage_index_never_advances_past_a_failed_stage() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    fixture.harness.script(
        bundle.id.clone(),
        HarnessReport {
            exit_code: 1,
            output: "assertion failed in test_pipeline".to_string(),
        },
    );

    let registry = EnvironmentRegistry::new(vec![
        EnvironmentTarget::new("dev", 1).with_gate(test_gate("dev-tests", RetryPolicy::default())),
        EnvironmentTarget::new("prod", 2).with_gate(syntax_gate("prod-lint")),
    ])
    .unwrap();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Failed { .. }));

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.current_stage_index, 0);
    assert_eq!(run.status, RunStatus::Failed);
    // Nothing ever ran against prod.
    assert!(run.history.iter().all(|a| a.stage_name == "dev"));
}

#[tokio::test]
async fn transient_failure_then_recovery() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    // Staging smoke-style failure on attempt 1, green on attempt 2.
    fixture.harness.script(
        bundle.id.clone(),
        HarnessReport {
            exit_code: 1,
            output: "connection refused while reaching sandbox".to_string(),
        },
    );
    fixture.harness.script(
        bundle.id.clone(),
        HarnessReport {
            exit_code: 0,
            output: "all checks green".to_string(),
        },
    );

    let registry = EnvironmentRegistry::new(vec![
        EnvironmentTarget::new("staging", 1)
            .with_gate(test_gate("staging-smoke", RetryPolicy::new(3, Duration::from_secs(1), 2))),
        EnvironmentTarget::new("prod", 2).with_gate(syntax_gate("prod-lint")),
    ])
    .unwrap();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    match outcome {
        StageOutcome::Blocked { plan, retry_in } => {
            assert_eq!(plan.failure_class, FailureClass::Transient);
            assert!(plan.retryable);
            assert_eq!(retry_in, Duration::from_secs(1));
        }
        other => panic!("expected Blocked, got {other:?}"),
    }

    // External trigger retries after the backoff hint.
    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Advanced { .. }));

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Completed));

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    let staging_attempts: Vec<_> = run
        .history
        .iter()
        .filter(|a| a.stage_name == "staging")
        .collect();
    assert_eq!(staging_attempts.len(), 2);
    assert_eq!(staging_attempts[0].attempt_number, 1);
    assert_eq!(staging_attempts[0].outcome, AttemptOutcome::Fail);
    assert_eq!(staging_attempts[1].attempt_number, 2);
    assert_eq!(staging_attempts[1].outcome, AttemptOutcome::Pass);
}

#[tokio::test]
async fn permission_failure_is_terminal_regardless_of_retry_budget() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    fixture.harness.script(
        bundle.id.clone(),
        HarnessReport {
            exit_code: 1,
            output: "HTTP 403 Forbidden from workspace API".to_string(),
        },
    );

    let registry = EnvironmentRegistry::new(vec![EnvironmentTarget::new("prod", 1).with_gate(
        test_gate("prod-deploy", RetryPolicy::new(5, Duration::from_secs(1), 2)),
    )])
    .unwrap();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    match outcome {
        StageOutcome::Failed { plan } => {
            assert_eq!(plan.failure_class, FailureClass::PermissionDenied);
            assert!(!plan.retryable);
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.history.len(), 1);
}

#[tokio::test]
async fn retry_budget_of_two_yields_exactly_two_attempts() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    // Always transient, never recovers.
    fixture.harness.script(
        bundle.id.clone(),
        HarnessReport {
            exit_code: 1,
            output: "service unavailable".to_string(),
        },
    );

    let registry = EnvironmentRegistry::new(vec![EnvironmentTarget::new("dev", 1).with_gate(
        test_gate("dev-smoke", RetryPolicy::new(2, Duration::from_secs(1), 2)),
    )])
    .unwrap();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Blocked { .. }));

    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Failed { .. }));

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.history.len(), 2);

    // Terminal: a further advance is a no-op.
    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::AlreadyTerminal));
    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.history.len(), 2);
}

#[tokio::test]
async fn duplicate_submit_conflicts_and_creates_no_run() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    let registry = three_stage_registry();

    let first = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let second = fixture.orchestrator.submit(bundle.id.clone(), &registry).await;
    match second {
        Err(OrchestratorError::Conflict { run_id, .. }) => {
            assert_eq!(run_id, Some(first));
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert_eq!(fixture.runs.len(), 1);
}

#[tokio::test]
async fn resubmit_allowed_after_terminal_run() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    let registry = three_stage_registry();

    let first = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();
    fixture.orchestrator.abort(&first, "operator stop").await.unwrap();

    let second = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();
    assert_ne!(first, second);

    // The new run carries lineage to its aborted predecessor.
    let run = fixture.orchestrator.get_status(&second).await.unwrap();
    assert_eq!(run.prior_run, Some(first));
}

#[tokio::test]
async fn get_status_is_idempotent_between_advances() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    let registry = three_stage_registry();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();
    fixture.orchestrator.advance(&run_id).await.unwrap();

    let snap1 = fixture.orchestrator.get_status(&run_id).await.unwrap();
    let snap2 = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(
        serde_json::to_value(&snap1).unwrap(),
        serde_json::to_value(&snap2).unwrap()
    );
}

#[tokio::test]
async fn concurrent_advance_gets_busy_and_one_attempt_lands() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;

    // A manual approval gate holds the first advance open.
    let registry = EnvironmentRegistry::new(vec![EnvironmentTarget::new("prod", 1).with_gate(
        GateSpec::new("prod-signoff", GateKind::ManualApproval, Duration::from_secs(10)),
    )])
    .unwrap();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let orchestrator = Arc::clone(&fixture.orchestrator);
    let in_flight_run = run_id.clone();
    let first = tokio::spawn(async move { orchestrator.advance(&in_flight_run).await });

    // Let the first call reach the approval poll loop.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = fixture.orchestrator.advance(&run_id).await;
    assert!(matches!(second, Err(OrchestratorError::Busy(_))));

    fixture.approvals.record(
        bundle.id.clone(),
        "prod-signoff",
        ApprovalDecision::Approved {
            approver: "release-manager".to_string(),
        },
    );

    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, StageOutcome::Completed));

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.history.len(), 1);
}

#[tokio::test]
async fn abort_cancels_in_flight_gate_and_records_the_attempt() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;

    let registry = EnvironmentRegistry::new(vec![EnvironmentTarget::new("prod", 1).with_gate(
        GateSpec::new("prod-signoff", GateKind::ManualApproval, Duration::from_secs(30)),
    )])
    .unwrap();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    let orchestrator = Arc::clone(&fixture.orchestrator);
    let in_flight_run = run_id.clone();
    let advancing = tokio::spawn(async move { orchestrator.advance(&in_flight_run).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let aborted = fixture
        .orchestrator
        .abort(&run_id, "deployment window closed")
        .await
        .unwrap();
    assert_eq!(aborted.status, RunStatus::Aborted);

    let outcome = advancing.await.unwrap().unwrap();
    assert!(matches!(outcome, StageOutcome::AlreadyTerminal));

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.history.len(), 1);
    assert_eq!(run.history[0].outcome, AttemptOutcome::Skipped);
    // The interrupted gate still wrote its diagnostic record.
    assert!(run.history[0].gate_results[0]
        .diagnostics
        .starts_with("cancelled"));

    // Abort is idempotent on terminal runs.
    let again = fixture.orchestrator.abort(&run_id, "again").await.unwrap();
    assert_eq!(again.status, RunStatus::Aborted);
}

/// History log that aborts the run the moment its first stage attempt
/// is recorded, landing the abort after the gate loop but before the
/// orchestrator commits the stage outcome.
struct AbortDuringCommitLog {
    inner: InMemoryHistoryLog,
    orchestrator: Mutex<Option<Arc<Orchestrator>>>,
    fired: AtomicBool,
}

impl AbortDuringCommitLog {
    fn new() -> Self {
        Self {
            inner: InMemoryHistoryLog::new(),
            orchestrator: Mutex::new(None),
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl HistoryLog for AbortDuringCommitLog {
    async fn append(&self, run_id: &RunId, event: RunEvent) -> Result<(), HistoryError> {
        let fire = matches!(event, RunEvent::StageRecorded { .. })
            && !self.fired.swap(true, Ordering::SeqCst);
        self.inner.append(run_id, event).await?;

        if fire {
            let orchestrator = match self.orchestrator.lock() {
                Ok(guard) => guard.clone(),
                Err(_) => None,
            };
            if let Some(orchestrator) = orchestrator {
                orchestrator
                    .abort(run_id, "deployment window closed")
                    .await
                    .map_err(|e| HistoryError::WriteFailed(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn events_for(&self, run_id: &RunId) -> Result<Vec<RecordedEvent>, HistoryError> {
        self.inner.events_for(run_id).await
    }
}

#[tokio::test]
async fn abort_racing_a_finished_stage_stays_terminal() {
    let history = Arc::new(AbortDuringCommitLog::new());
    let fixture = make_fixture_with_history(Arc::clone(&history) as Arc<dyn HistoryLog>);
    *history.orchestrator.lock().unwrap() = Some(Arc::clone(&fixture.orchestrator));

    let bundle = store_bundle(&fixture).await;
    let registry = EnvironmentRegistry::new(vec![
        EnvironmentTarget::new("dev", 1).with_gate(syntax_gate("dev-lint")),
    ])
    .unwrap();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    // The gate passes, but the abort lands before the stage outcome is
    // saved; the advance must not resurrect the aborted run.
    let outcome = fixture.orchestrator.advance(&run_id).await.unwrap();
    assert!(matches!(outcome, StageOutcome::AlreadyTerminal));

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
}

#[tokio::test]
async fn history_write_failure_fails_the_call() {
    let fixture = make_fixture_with_history(Arc::new(FailingHistoryLog));
    let bundle = store_bundle(&fixture).await;
    let registry = three_stage_registry();

    // Submit cannot record the creation event, so no run is created.
    let result = fixture.orchestrator.submit(bundle.id.clone(), &registry).await;
    assert!(matches!(result, Err(OrchestratorError::History(_))));
    assert_eq!(fixture.runs.len(), 0);

    // A pre-existing run cannot advance either: the transition would be
    // unrecorded.
    let run = ascent_types::PromotionRun::new(bundle.id.clone(), registry.snapshot());
    let run_id = run.run_id.clone();
    fixture.runs.save(&run).await.unwrap();

    let result = fixture.orchestrator.advance(&run_id).await;
    assert!(matches!(result, Err(OrchestratorError::History(_))));

    let unchanged = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(unchanged.status, RunStatus::Pending);
    assert!(unchanged.history.is_empty());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let fixture = make_fixture();
    let registry = three_stage_registry();

    let result = fixture
        .orchestrator
        .submit(ascent_types::BundleId::generate(), &registry)
        .await;
    assert!(matches!(result, Err(OrchestratorError::BundleNotFound(_))));

    let result = fixture
        .orchestrator
        .advance(&ascent_types::RunId::generate())
        .await;
    assert!(matches!(result, Err(OrchestratorError::RunNotFound(_))));
}

#[tokio::test]
async fn history_records_every_transition_in_sequence() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    let registry = three_stage_registry();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();
    fixture.orchestrator.advance(&run_id).await.unwrap();

    let events = fixture.orchestrator.events(&run_id).await.unwrap();
    assert!(events.len() >= 5); // created, stage started, gate, recorded, status changes
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.sequence, i as u64);
    }
}

#[tokio::test]
async fn registry_edits_do_not_affect_resolved_runs() {
    let fixture = make_fixture();
    let bundle = store_bundle(&fixture).await;
    let registry = three_stage_registry();

    let run_id = fixture
        .orchestrator
        .submit(bundle.id.clone(), &registry)
        .await
        .unwrap();

    // A "new version" of the registry exists now; the run keeps its
    // three resolved targets.
    let _edited = EnvironmentRegistry::new(vec![
        EnvironmentTarget::new("dev", 1).with_gate(syntax_gate("dev-lint"))
    ])
    .unwrap();

    let run = fixture.orchestrator.get_status(&run_id).await.unwrap();
    assert_eq!(run.targets.len(), 3);
}
