//! Validation gate execution for Ascent.
//!
//! The [`GateRunner`] executes one [`GateSpec`](ascent_types::GateSpec)
//! against a target and bundle and always produces a
//! [`GateResult`](ascent_types::GateResult): a failing check is data,
//! not an error. Each gate kind has its own executor behind the
//! [`GateCheck`] trait; the runner adds the shared concerns — hard
//! timeout, cooperative cancellation, diagnostic capture, and secret
//! redaction.

pub mod checks;
pub mod context;
pub mod error;
pub mod executor;
pub mod runner;
pub mod secrets;

pub use checks::approval::{ApprovalDecision, ApprovalLedger, InMemoryApprovalLedger};
pub use checks::test_suite::{HarnessReport, ScriptedTestHarness, TestHarness};
pub use context::GateContext;
pub use error::{GateError, Result};
pub use executor::{CheckOutcome, GateCheck};
pub use runner::{CancelSignal, GateRunner};
pub use secrets::{SecretError, SecretProvider, StaticSecretProvider};
