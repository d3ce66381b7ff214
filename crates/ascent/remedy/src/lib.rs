//! Remediation planning: pure classification of gate failures.
//!
//! Given a failed gate result, [`plan`] inspects the diagnostic text and
//! gate kind against a fixed rule table and produces a structured
//! [`RemediationPlan`]. No mutation, no I/O: notification and retry
//! scheduling belong to the caller.
//!
//! Retry policy by class:
//! - `Transient` is retryable: the environment may recover on its own.
//! - `ConfigurationError` is retryable within the stage's bounded retry
//!   budget, in case an operator fixes the config between attempts.
//! - `CodeDefect` and `PermissionDenied` are never auto-retried: without
//!   a code or permission change a retry cannot succeed and would only
//!   mask the failure.

use ascent_types::{FailureClass, GateKind, GateResult, RemediationPlan};

/// Diagnostic substrings indicating authorization failures. Checked
/// first: a 403 that also mentions a connection problem is still a
/// permission failure, not a transient one.
const PERMISSION_PATTERNS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "permission denied",
    "access denied",
    "invalid token",
    "token expired",
];

/// Diagnostic substrings indicating environmental flakiness.
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "timeout exceeded",
    "timed out",
    "temporarily unavailable",
    "service unavailable",
    "network",
    "dns",
    "502",
    "503",
    "504",
];

/// Diagnostic substrings indicating bad configuration.
const CONFIGURATION_PATTERNS: &[&str] = &[
    "schema",
    "lint",
    "invalid configuration",
    "malformed",
    "missing required parameter",
    "unknown field",
    "parse error",
];

/// Diagnostic substrings indicating broken code.
const CODE_DEFECT_PATTERNS: &[&str] = &[
    "assertion failed",
    "test failed",
    "tests failed",
    "panicked",
    "stack trace",
    "traceback",
    "exit code",
    "compilation failed",
];

/// Classify a failed gate result into a remediation plan.
///
/// The gate kind biases classification where diagnostics are ambiguous:
/// a failing syntax check with no matching pattern is still a
/// configuration problem, and a failing test suite is a code defect.
pub fn plan(result: &GateResult, kind: GateKind) -> RemediationPlan {
    let diagnostics = result.diagnostics.to_lowercase();

    let matches_any = |patterns: &[&str]| patterns.iter().any(|p| diagnostics.contains(p));

    if matches_any(PERMISSION_PATTERNS) {
        return RemediationPlan::new(
            FailureClass::PermissionDenied,
            format!(
                "Gate '{}' was denied access; verify the credentials and grants \
                 for this target before resubmitting",
                result.gate_name
            ),
            false,
        );
    }

    if matches_any(TRANSIENT_PATTERNS) {
        return RemediationPlan::new(
            FailureClass::Transient,
            format!(
                "Gate '{}' hit an environmental fault; retry with backoff",
                result.gate_name
            ),
            true,
        );
    }

    if matches_any(CONFIGURATION_PATTERNS) || kind == GateKind::SyntaxCheck {
        return RemediationPlan::new(
            FailureClass::ConfigurationError,
            format!(
                "Gate '{}' rejected the bundle configuration; fix the reported \
                 fields and retry within the stage budget",
                result.gate_name
            ),
            true,
        );
    }

    if matches_any(CODE_DEFECT_PATTERNS) || kind == GateKind::TestSuite {
        return RemediationPlan::new(
            FailureClass::CodeDefect,
            format!(
                "Gate '{}' found a defect in the bundle; land a code fix and \
                 submit a new bundle",
                result.gate_name
            ),
            false,
        );
    }

    RemediationPlan::new(
        FailureClass::Unknown,
        format!(
            "Gate '{}' failed for an unrecognized reason; inspect the \
             diagnostics manually",
            result.gate_name
        ),
        false,
    )
}
