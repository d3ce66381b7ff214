//! Environment targets and gate specifications.
//!
//! An [`EnvironmentTarget`] is one named stop on the promotion path
//! (dev, staging, prod). Its ordered gate list defines what must pass
//! before a bundle may advance past it. Targets are static
//! configuration, read-only during a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One named environment in the promotion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentTarget {
    /// Target name, unique within a registry (e.g. "staging")
    pub name: String,
    /// Position in the promotion order; strictly increasing across the registry
    pub order: u32,
    /// Gates that must all pass, in declaration order (cheap-to-expensive
    /// by convention; later gates only run if earlier ones pass)
    pub required_gates: Vec<GateSpec>,
    /// Target-specific parameters merged over the bundle's parameters at
    /// gate execution time (target wins)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_overrides: BTreeMap<String, String>,
}

impl EnvironmentTarget {
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        Self {
            name: name.into(),
            order,
            required_gates: Vec::new(),
            parameter_overrides: BTreeMap::new(),
        }
    }

    pub fn with_gate(mut self, gate: GateSpec) -> Self {
        self.required_gates.push(gate);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameter_overrides.insert(key.into(), value.into());
        self
    }

    /// Bundle parameters with this target's overrides applied.
    pub fn effective_parameters(
        &self,
        bundle_parameters: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut merged = bundle_parameters.clone();
        for (key, value) in &self.parameter_overrides {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// The kind of check a gate performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateKind {
    /// Local, fast, deterministic bundle validation
    SyntaxCheck,
    /// Bounded automated test execution
    TestSuite,
    /// Liveness probe against a deployed sandbox of the target
    SmokeTest,
    /// Blocks until an external approval signal is recorded
    ManualApproval,
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateKind::SyntaxCheck => write!(f, "syntax-check"),
            GateKind::TestSuite => write!(f, "test-suite"),
            GateKind::SmokeTest => write!(f, "smoke-test"),
            GateKind::ManualApproval => write!(f, "manual-approval"),
        }
    }
}

/// Specification of one validation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSpec {
    /// Gate name, unique within its target
    pub name: String,
    /// What kind of check this gate runs
    pub kind: GateKind,
    /// Hard deadline; expiry records a failed result
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Retry budget for the enclosing stage when this gate fails retryably
    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

impl GateSpec {
    pub fn new(name: impl Into<String>, kind: GateKind, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            kind,
            timeout,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

/// Retry budget and backoff shape for a stage.
///
/// The orchestrator only enforces `max_attempts`; the backoff delay is a
/// hint applied by the external trigger between attempts, never slept on
/// internally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum stage attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "duration_secs")]
    pub base_delay: Duration,
    /// Exponential multiplier applied per subsequent retry
    pub multiplier: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
        }
    }

    /// No retries: one attempt only.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1)
    }

    /// Backoff hint before the given retry attempt (attempt numbers start
    /// at 1; the delay precedes attempt 2 onward).
    pub fn delay_for(&self, next_attempt: u32) -> Duration {
        if next_attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = next_attempt.saturating_sub(2).min(16);
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(30), 2)
    }
}

/// Serde helper: durations as whole seconds in config files.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
