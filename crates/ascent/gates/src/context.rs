//! Execution context handed to gate checks.

use crate::error::{GateError, Result};
use crate::secrets::SecretProvider;
use ascent_types::{Bundle, EnvironmentTarget};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Everything a gate check needs to execute: the bundle, the resolved
/// target parameters, a secret provider, and the cancellation signal.
///
/// Secrets resolved through the context are tracked so the runner can
/// redact their values from diagnostics before a result is recorded.
pub struct GateContext {
    bundle: Bundle,
    target: EnvironmentTarget,
    parameters: BTreeMap<String, String>,
    secrets: Arc<dyn SecretProvider>,
    cancel: watch::Receiver<bool>,
    resolved_secrets: Mutex<Vec<String>>,
}

impl GateContext {
    pub fn new(
        bundle: Bundle,
        target: EnvironmentTarget,
        secrets: Arc<dyn SecretProvider>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let parameters = target.effective_parameters(&bundle.parameters);
        Self {
            bundle,
            target,
            parameters,
            secrets,
            cancel,
            resolved_secrets: Mutex::new(Vec::new()),
        }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn target(&self) -> &EnvironmentTarget {
        &self.target
    }

    /// Bundle parameters with the target's overrides applied.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// A required parameter, or an execution error naming the gap.
    pub fn require_parameter(&self, key: &str) -> Result<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| {
                GateError::ExecutionFailed(format!("missing required parameter: {key}"))
            })
    }

    /// Resolve a secret, tracking the value for later redaction.
    pub async fn resolve_secret(&self, name: &str) -> Result<String> {
        let value = self.secrets.resolve(name).await?;
        if let Ok(mut resolved) = self.resolved_secrets.lock() {
            resolved.push(value.clone());
        }
        Ok(value)
    }

    /// Whether the run has been aborted. Checks must call this at each
    /// internal step and bail with [`GateError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Bail out if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GateError::Cancelled("run aborted".to_string()))
        } else {
            Ok(())
        }
    }

    /// Secret values resolved so far, for redaction.
    pub(crate) fn resolved_secret_values(&self) -> Vec<String> {
        self.resolved_secrets
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}
