//! Structured remediation output attached to failed stage attempts.

use serde::{Deserialize, Serialize};

/// Probable cause class of a gate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// Environmental flakiness (network, temporary unavailability)
    Transient,
    /// Bad configuration or schema; an operator fix may unblock a retry
    ConfigurationError,
    /// The bundle's code is broken; retrying cannot succeed
    CodeDefect,
    /// Missing credentials or authorization; retrying cannot succeed
    PermissionDenied,
    /// Diagnostics matched no known pattern
    Unknown,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Transient => write!(f, "transient"),
            FailureClass::ConfigurationError => write!(f, "configuration-error"),
            FailureClass::CodeDefect => write!(f, "code-defect"),
            FailureClass::PermissionDenied => write!(f, "permission-denied"),
            FailureClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Non-mutating diagnosis of a gate failure with a retry recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationPlan {
    /// Probable cause class
    pub failure_class: FailureClass,
    /// Human-readable corrective hint
    pub suggested_action: String,
    /// Whether an automatic retry is worthwhile
    pub retryable: bool,
}

impl RemediationPlan {
    pub fn new(
        failure_class: FailureClass,
        suggested_action: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            failure_class,
            suggested_action: suggested_action.into(),
            retryable,
        }
    }
}
