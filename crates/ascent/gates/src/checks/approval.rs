//! Manual-approval gate: blocks until an external approval signal is
//! recorded, subject to the gate timeout.

use crate::context::GateContext;
use crate::error::Result;
use crate::executor::{CheckOutcome, GateCheck};
use ascent_types::BundleId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

/// A recorded approval decision for (bundle, gate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved { approver: String },
    Rejected { approver: String, reason: String },
}

/// Where approval decisions land. The transport that records them
/// (ticketing, chat, CLI) is outside the engine.
#[async_trait]
pub trait ApprovalLedger: Send + Sync {
    async fn decision_for(
        &self,
        bundle_id: &BundleId,
        gate_name: &str,
    ) -> Option<ApprovalDecision>;
}

/// In-memory approval ledger for development and testing.
pub struct InMemoryApprovalLedger {
    decisions: DashMap<(BundleId, String), ApprovalDecision>,
}

impl InMemoryApprovalLedger {
    pub fn new() -> Self {
        Self {
            decisions: DashMap::new(),
        }
    }

    pub fn record(&self, bundle_id: BundleId, gate_name: impl Into<String>, decision: ApprovalDecision) {
        self.decisions.insert((bundle_id, gate_name.into()), decision);
    }
}

impl Default for InMemoryApprovalLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalLedger for InMemoryApprovalLedger {
    async fn decision_for(
        &self,
        bundle_id: &BundleId,
        gate_name: &str,
    ) -> Option<ApprovalDecision> {
        self.decisions
            .get(&(bundle_id.clone(), gate_name.to_string()))
            .map(|d| d.clone())
    }
}

/// Polls the approval ledger until a decision lands. The gate's hard
/// timeout (enforced by the runner) bounds the wait; cancellation is
/// checked between polls so an aborted run stops promptly.
pub struct ManualApprovalCheck {
    ledger: std::sync::Arc<dyn ApprovalLedger>,
    gate_name: String,
    poll_interval: Duration,
}

impl ManualApprovalCheck {
    pub fn new(ledger: std::sync::Arc<dyn ApprovalLedger>, gate_name: impl Into<String>) -> Self {
        Self {
            ledger,
            gate_name: gate_name.into(),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl GateCheck for ManualApprovalCheck {
    async fn check(&self, ctx: &GateContext) -> Result<CheckOutcome> {
        loop {
            ctx.check_cancelled()?;

            match self
                .ledger
                .decision_for(&ctx.bundle().id, &self.gate_name)
                .await
            {
                Some(ApprovalDecision::Approved { approver }) => {
                    return Ok(CheckOutcome::pass(format!("approved by {approver}")));
                }
                Some(ApprovalDecision::Rejected { approver, reason }) => {
                    return Ok(CheckOutcome::fail(format!(
                        "rejected by {approver}: {reason}"
                    )));
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    fn name(&self) -> &str {
        "manual-approval"
    }
}
