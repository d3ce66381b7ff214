//! Secret resolution at gate-execution time.
//!
//! Secrets are opaque to the engine: resolved per call, handed to the
//! executing gate, and never persisted. The runner redacts every
//! resolved value from diagnostics before a result is recorded.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Secret resolution errors
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("unknown secret: {0}")]
    Unknown(String),

    #[error("secret backend unavailable: {0}")]
    Unavailable(String),
}

/// Resolves named secrets for gate execution.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String, SecretError>;
}

/// Fixed secret map for development and testing.
pub struct StaticSecretProvider {
    values: DashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl Default for StaticSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        self.values
            .get(name)
            .map(|v| v.clone())
            .ok_or_else(|| SecretError::Unknown(name.to_string()))
    }
}
