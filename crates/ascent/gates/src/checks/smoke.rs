//! Smoke-test gate: probes a liveness endpoint of the target sandbox.

use crate::context::GateContext;
use crate::error::Result;
use crate::executor::{CheckOutcome, GateCheck};
use async_trait::async_trait;
use std::time::Duration;

/// Parameter carrying the liveness URL of the target's sandbox
/// deployment, usually set via target overrides.
const LIVENESS_URL_KEY: &str = "liveness_url";

/// Optional parameter naming a secret whose value is sent as a bearer
/// token on the probe request.
const AUTH_SECRET_KEY: &str = "liveness_auth_secret";

/// Probes the target's liveness endpoint over HTTP and passes on any
/// 2xx response. The deployment of the sandbox itself is the platform's
/// job; by the time this gate runs the endpoint either answers or the
/// stage fails.
pub struct SmokeTestCheck {
    client: reqwest::Client,
}

impl SmokeTestCheck {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Client with a per-request timeout below the gate's hard deadline,
    /// so probe failures carry their own diagnostics instead of the
    /// generic timeout record.
    pub fn with_probe_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for SmokeTestCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GateCheck for SmokeTestCheck {
    async fn check(&self, ctx: &GateContext) -> Result<CheckOutcome> {
        ctx.check_cancelled()?;

        let url = ctx.require_parameter(LIVENESS_URL_KEY)?.to_string();

        let mut request = self.client.get(&url);
        if let Some(secret_name) = ctx.parameters().get(AUTH_SECRET_KEY) {
            let token = ctx.resolve_secret(secret_name).await?;
            request = request.bearer_auth(token);
        }

        ctx.check_cancelled()?;

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Ok(CheckOutcome::pass(format!(
                        "liveness probe of {url} returned {status}"
                    )))
                } else {
                    Ok(CheckOutcome::fail(format!(
                        "liveness probe of {url} returned {status}"
                    )))
                }
            }
            Err(err) => Ok(CheckOutcome::fail(format!(
                "liveness probe of {url} failed: {err}"
            ))),
        }
    }

    fn name(&self) -> &str {
        "smoke-test"
    }
}
