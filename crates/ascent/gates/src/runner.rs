//! The gate runner: shared execution machinery around gate checks.
//!
//! The runner owns the concerns every gate kind shares: building the
//! execution context, enforcing the hard timeout, converting execution
//! errors into recorded results, and redacting resolved secrets from
//! diagnostics. Per-kind behavior lives in [`crate::checks`].

use crate::checks::{ManualApprovalCheck, SmokeTestCheck, SyntaxCheck, TestSuiteCheck};
use crate::checks::approval::ApprovalLedger;
use crate::checks::test_suite::TestHarness;
use crate::context::GateContext;
use crate::error::GateError;
use crate::executor::GateCheck;
use crate::secrets::SecretProvider;
use ascent_types::{Bundle, EnvironmentTarget, GateKind, GateResult, GateSpec};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Cancellation signal for in-flight gate executions; flipped to `true`
/// when the enclosing run is aborted.
pub type CancelSignal = watch::Receiver<bool>;

/// Executes gates against targets.
///
/// Stateless between calls: every invocation builds a fresh context, so
/// secrets never outlive a single gate execution.
pub struct GateRunner {
    harness: Arc<dyn TestHarness>,
    approvals: Arc<dyn ApprovalLedger>,
    secrets: Arc<dyn SecretProvider>,
}

impl GateRunner {
    pub fn new(
        harness: Arc<dyn TestHarness>,
        approvals: Arc<dyn ApprovalLedger>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            harness,
            approvals,
            secrets,
        }
    }

    /// Run one gate to completion and record the result.
    ///
    /// Never returns an error for a failing check: timeouts,
    /// cancellation, and execution faults all land in the returned
    /// [`GateResult`] with full diagnostics, as remediation and audit
    /// require the record either way.
    pub async fn run(
        &self,
        gate: &GateSpec,
        target: &EnvironmentTarget,
        bundle: &Bundle,
        cancel: CancelSignal,
    ) -> GateResult {
        let check = self.check_for(gate);
        let ctx = GateContext::new(
            bundle.clone(),
            target.clone(),
            Arc::clone(&self.secrets),
            cancel,
        );

        tracing::debug!(
            gate = %gate.name,
            kind = %gate.kind,
            target = %target.name,
            "Running gate"
        );

        let started = Instant::now();
        let outcome = tokio::time::timeout(gate.timeout, check.check(&ctx)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (passed, diagnostics) = match outcome {
            Ok(Ok(result)) => (result.passed, result.diagnostics),
            Ok(Err(GateError::Cancelled(reason))) => (false, format!("cancelled: {reason}")),
            Ok(Err(err)) => (false, err.to_string()),
            Err(_elapsed) => (false, GateError::Timeout.to_string()),
        };

        let diagnostics = redact(diagnostics, &ctx.resolved_secret_values());

        if !passed {
            tracing::warn!(
                gate = %gate.name,
                target = %target.name,
                duration_ms,
                "Gate failed"
            );
        }

        GateResult {
            gate_name: gate.name.clone(),
            passed,
            diagnostics,
            duration_ms,
        }
    }

    fn check_for(&self, gate: &GateSpec) -> Box<dyn GateCheck> {
        match gate.kind {
            GateKind::SyntaxCheck => Box::new(SyntaxCheck),
            GateKind::TestSuite => Box::new(TestSuiteCheck::new(Arc::clone(&self.harness))),
            GateKind::SmokeTest => Box::new(SmokeTestCheck::new()),
            GateKind::ManualApproval => Box::new(ManualApprovalCheck::new(
                Arc::clone(&self.approvals),
                gate.name.clone(),
            )),
        }
    }
}

/// Strip resolved secret values from diagnostic text before it is
/// recorded anywhere durable.
fn redact(mut diagnostics: String, secrets: &[String]) -> String {
    for secret in secrets {
        if !secret.is_empty() {
            diagnostics = diagnostics.replace(secret.as_str(), "[redacted]");
        }
    }
    diagnostics
}
