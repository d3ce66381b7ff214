//! Configuration for ascent-daemon

use ascent_registry::EnvironmentRegistry;
use ascent_types::{EnvironmentTarget, GateKind, GateSpec, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Path to the environment registry JSON file; `None` uses the
    /// built-in development registry
    pub registry_path: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            registry_path: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl DaemonConfig {
    /// Resolve the environment registry from configuration.
    pub fn load_registry(&self) -> Result<EnvironmentRegistry, ascent_registry::RegistryError> {
        match &self.registry_path {
            Some(path) => EnvironmentRegistry::from_file(path),
            None => {
                tracing::warn!("No registry file configured, using the development registry");
                Ok(development_registry())
            }
        }
    }
}

/// A dev/staging/prod registry with sensible gates, used when no
/// registry file is configured.
pub fn development_registry() -> EnvironmentRegistry {
    EnvironmentRegistry::new(vec![
        EnvironmentTarget::new("dev", 1)
            .with_gate(GateSpec::new(
                "dev-lint",
                GateKind::SyntaxCheck,
                Duration::from_secs(30),
            ))
            .with_gate(GateSpec::new(
                "dev-tests",
                GateKind::TestSuite,
                Duration::from_secs(600),
            )),
        EnvironmentTarget::new("staging", 2)
            .with_gate(GateSpec::new(
                "staging-tests",
                GateKind::TestSuite,
                Duration::from_secs(600),
            ))
            .with_gate(
                GateSpec::new("staging-smoke", GateKind::SmokeTest, Duration::from_secs(120))
                    .with_retry_policy(RetryPolicy::new(3, Duration::from_secs(30), 2)),
            ),
        EnvironmentTarget::new("prod", 3)
            .with_gate(GateSpec::new(
                "prod-signoff",
                GateKind::ManualApproval,
                Duration::from_secs(3600),
            ))
            .with_gate(
                GateSpec::new("prod-smoke", GateKind::SmokeTest, Duration::from_secs(120))
                    .with_retry_policy(RetryPolicy::new(3, Duration::from_secs(30), 2)),
            ),
    ])
    .expect("valid development registry")
}
