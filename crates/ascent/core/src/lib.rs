//! The Ascent promotion orchestrator.
//!
//! The only component with cross-stage state: it owns the
//! [`PromotionRun`](ascent_types::PromotionRun) record, consults the
//! environment registry for ordering, drives the gate runner per stage,
//! applies remediation plans on failure, and appends every transition
//! to the run history log before reporting it.

pub mod error;
pub mod orchestrator;
pub mod store;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{Orchestrator, StageOutcome};
pub use store::{InMemoryRunStore, RunStore, RunStoreError};
