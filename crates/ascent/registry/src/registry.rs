//! The environment registry: validated, ordered target configuration.

use ascent_types::EnvironmentTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Registry validation and loading errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry must define at least one target")]
    Empty,

    #[error("Duplicate target name: {0}")]
    DuplicateName(String),

    #[error("Target order must be strictly increasing: {current} follows {previous}")]
    OrderNotIncreasing { previous: u32, current: u32 },

    #[error("Target '{0}' defines no gates")]
    NoGates(String),

    #[error("Failed to read registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse registry: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static, ordered configuration of promotion targets.
///
/// A registry is an immutable value: edits produce a new registry that
/// only affects future submissions. The orchestrator copies
/// [`snapshot`](EnvironmentRegistry::snapshot) into each run at submit
/// time, so in-flight runs keep their resolved ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRegistry {
    targets: Vec<EnvironmentTarget>,
}

impl EnvironmentRegistry {
    /// Build a registry, validating the target list.
    pub fn new(targets: Vec<EnvironmentTarget>) -> Result<Self, RegistryError> {
        if targets.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut names = HashSet::new();
        let mut previous: Option<u32> = None;
        for target in &targets {
            if !names.insert(target.name.clone()) {
                return Err(RegistryError::DuplicateName(target.name.clone()));
            }
            if let Some(prev) = previous {
                if target.order <= prev {
                    return Err(RegistryError::OrderNotIncreasing {
                        previous: prev,
                        current: target.order,
                    });
                }
            }
            if target.required_gates.is_empty() {
                return Err(RegistryError::NoGates(target.name.clone()));
            }
            previous = Some(target.order);
        }

        Ok(Self { targets })
    }

    /// Load and validate a registry from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let targets: Vec<EnvironmentTarget> = serde_json::from_str(json)?;
        Self::new(targets)
    }

    /// Load and validate a registry from a JSON file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// The ordered target list, resolved once per run at submit time.
    pub fn snapshot(&self) -> Vec<EnvironmentTarget> {
        self.targets.clone()
    }

    /// Ordered view of the targets.
    pub fn targets(&self) -> &[EnvironmentTarget] {
        &self.targets
    }

    /// Number of promotion stages.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
