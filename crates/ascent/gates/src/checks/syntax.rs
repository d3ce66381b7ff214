//! Syntax check: local, fast, deterministic bundle validation.

use crate::context::GateContext;
use crate::error::Result;
use crate::executor::{CheckOutcome, GateCheck};
use async_trait::async_trait;

/// Validates the bundle's declared content before anything expensive
/// runs: checksum integrity, a non-empty source revision, and that
/// every parameter the target requires is present after overrides.
pub struct SyntaxCheck;

/// Parameter listing the comma-separated keys a target requires,
/// e.g. `required_parameters = "workspace,entry_point"`.
const REQUIRED_PARAMETERS_KEY: &str = "required_parameters";

#[async_trait]
impl GateCheck for SyntaxCheck {
    async fn check(&self, ctx: &GateContext) -> Result<CheckOutcome> {
        let bundle = ctx.bundle();
        let mut problems = Vec::new();

        if bundle.source_revision.trim().is_empty() {
            problems.push("source revision is empty".to_string());
        }

        if !bundle.checksum_valid() {
            problems.push(format!(
                "schema validation error: checksum mismatch (declared {}, computed {})",
                bundle.checksum,
                bundle.expected_checksum()
            ));
        }

        if let Some(required) = ctx.parameters().get(REQUIRED_PARAMETERS_KEY) {
            for key in required.split(',').map(str::trim).filter(|k| !k.is_empty()) {
                if key != REQUIRED_PARAMETERS_KEY && !ctx.parameters().contains_key(key) {
                    problems.push(format!("missing required parameter: {key}"));
                }
            }
        }

        if problems.is_empty() {
            Ok(CheckOutcome::pass(format!(
                "bundle {} validated against target '{}'",
                bundle.id,
                ctx.target().name
            )))
        } else {
            Ok(CheckOutcome::fail(problems.join("; ")))
        }
    }

    fn name(&self) -> &str {
        "syntax-check"
    }
}
