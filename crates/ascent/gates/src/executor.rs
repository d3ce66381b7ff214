//! The gate check trait and outcome type.

use crate::context::GateContext;
use crate::error::Result;
use async_trait::async_trait;

/// What a check concluded: pass/fail plus captured diagnostics.
///
/// A failed check is a normal outcome, not an error; errors are reserved
/// for checks that could not run at all.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub passed: bool,
    pub diagnostics: String,
}

impl CheckOutcome {
    pub fn pass(diagnostics: impl Into<String>) -> Self {
        Self {
            passed: true,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn fail(diagnostics: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Trait for gate kind executors.
///
/// A check must be idempotent: running it twice against the same bundle
/// and target with no intervening change must produce the same `passed`
/// value, barring genuine environmental flakiness.
#[async_trait]
pub trait GateCheck: Send + Sync {
    /// Execute the check. The hard timeout is enforced by the runner,
    /// but long-running checks must also poll `ctx.check_cancelled()`.
    async fn check(&self, ctx: &GateContext) -> Result<CheckOutcome>;

    /// Check name for logging.
    fn name(&self) -> &str;
}
