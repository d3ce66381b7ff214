//! Test-suite gate: runs a bounded test command through an injected
//! harness and parses pass/fail.

use crate::context::GateContext;
use crate::error::{GateError, Result};
use crate::executor::{CheckOutcome, GateCheck};
use ascent_types::BundleId;
use async_trait::async_trait;
use dashmap::DashMap;

/// Outcome of one harness invocation.
#[derive(Debug, Clone)]
pub struct HarnessReport {
    /// Process-style exit code; 0 means all tests passed
    pub exit_code: i32,
    /// Captured stdout/stderr-equivalent output
    pub output: String,
}

/// Executes the bundle's test suite. The engine never shells out
/// directly; the platform adapter implements this seam.
#[async_trait]
pub trait TestHarness: Send + Sync {
    async fn run_tests(&self, bundle_id: &BundleId, suite: &str) -> Result<HarnessReport>;
}

/// Harness returning pre-scripted reports per bundle, for development
/// and testing. Unscripted bundles pass with empty output.
pub struct ScriptedTestHarness {
    reports: DashMap<BundleId, Vec<HarnessReport>>,
}

impl ScriptedTestHarness {
    pub fn new() -> Self {
        Self {
            reports: DashMap::new(),
        }
    }

    /// Queue a report for a bundle; reports are consumed in order, the
    /// last one repeating.
    pub fn script(&self, bundle_id: BundleId, report: HarnessReport) {
        self.reports.entry(bundle_id).or_default().push(report);
    }
}

impl Default for ScriptedTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestHarness for ScriptedTestHarness {
    async fn run_tests(&self, bundle_id: &BundleId, _suite: &str) -> Result<HarnessReport> {
        if let Some(mut queued) = self.reports.get_mut(bundle_id) {
            if queued.len() > 1 {
                return Ok(queued.remove(0));
            }
            if let Some(last) = queued.first() {
                return Ok(last.clone());
            }
        }
        Ok(HarnessReport {
            exit_code: 0,
            output: String::new(),
        })
    }
}

/// Parameter naming the suite to run; defaults to "default".
const TEST_SUITE_KEY: &str = "test_suite";

/// Runs the bundle's test suite via the injected harness.
pub struct TestSuiteCheck {
    harness: std::sync::Arc<dyn TestHarness>,
}

impl TestSuiteCheck {
    pub fn new(harness: std::sync::Arc<dyn TestHarness>) -> Self {
        Self { harness }
    }
}

#[async_trait]
impl GateCheck for TestSuiteCheck {
    async fn check(&self, ctx: &GateContext) -> Result<CheckOutcome> {
        ctx.check_cancelled()?;

        let suite = ctx
            .parameters()
            .get(TEST_SUITE_KEY)
            .map(String::as_str)
            .unwrap_or("default");

        let report = self
            .harness
            .run_tests(&ctx.bundle().id, suite)
            .await
            .map_err(|e| match e {
                GateError::Cancelled(reason) => GateError::Cancelled(reason),
                other => GateError::ExecutionFailed(other.to_string()),
            })?;

        if report.exit_code == 0 {
            Ok(CheckOutcome::pass(report.output))
        } else {
            Ok(CheckOutcome::fail(format!(
                "test suite '{}' failed with exit code {}\n{}",
                suite, report.exit_code, report.output
            )))
        }
    }

    fn name(&self) -> &str {
        "test-suite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretProvider;
    use ascent_types::{Bundle, EnvironmentTarget};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::watch;

    fn make_ctx(bundle: Bundle) -> GateContext {
        let (_tx, rx) = watch::channel(false);
        GateContext::new(
            bundle,
            EnvironmentTarget::new("dev", 1),
            Arc::new(StaticSecretProvider::new()),
            rx,
        )
    }

    #[tokio::test]
    async fn test_green_suite_passes() {
        let bundle = Bundle::new("rev-1", BTreeMap::new());
        let harness = Arc::new(ScriptedTestHarness::new());
        harness.script(
            bundle.id.clone(),
            HarnessReport {
                exit_code: 0,
                output: "14 passed".to_string(),
            },
        );

        let check = TestSuiteCheck::new(harness);
        let outcome = check.check(&make_ctx(bundle)).await.unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.diagnostics, "14 passed");
    }

    #[tokio::test]
    async fn test_red_suite_fails_with_output_captured() {
        let bundle = Bundle::new("rev-1", BTreeMap::new());
        let harness = Arc::new(ScriptedTestHarness::new());
        harness.script(
            bundle.id.clone(),
            HarnessReport {
                exit_code: 1,
                output: "assertion failed: expected 200".to_string(),
            },
        );

        let check = TestSuiteCheck::new(harness);
        let outcome = check.check(&make_ctx(bundle)).await.unwrap();
        assert!(!outcome.passed);
        assert!(outcome.diagnostics.contains("exit code 1"));
        assert!(outcome.diagnostics.contains("assertion failed"));
    }

    #[tokio::test]
    async fn test_scripted_reports_consumed_in_order() {
        let bundle = Bundle::new("rev-1", BTreeMap::new());
        let harness = ScriptedTestHarness::new();
        harness.script(
            bundle.id.clone(),
            HarnessReport {
                exit_code: 1,
                output: "flake".to_string(),
            },
        );
        harness.script(
            bundle.id.clone(),
            HarnessReport {
                exit_code: 0,
                output: "ok".to_string(),
            },
        );

        let first = harness.run_tests(&bundle.id, "default").await.unwrap();
        let second = harness.run_tests(&bundle.id, "default").await.unwrap();
        assert_eq!(first.exit_code, 1);
        assert_eq!(second.exit_code, 0);
    }
}
