//! Shared data model for the Ascent promotion engine.
//!
//! Everything here is plain data: strongly-typed identifiers, the
//! immutable [`Bundle`] artifact, environment target configuration,
//! and the mutable [`PromotionRun`] record with its append-only
//! attempt history. All logic that mutates a run lives in
//! `ascent-core`; these types only provide constructors and
//! record-keeping helpers.

pub mod bundle;
pub mod ids;
pub mod remediation;
pub mod run;
pub mod target;

pub use bundle::Bundle;
pub use ids::{BundleId, RunId};
pub use remediation::{FailureClass, RemediationPlan};
pub use run::{AttemptOutcome, GateResult, PromotionRun, RunStatus, StageAttempt};
pub use target::{EnvironmentTarget, GateKind, GateSpec, RetryPolicy};
