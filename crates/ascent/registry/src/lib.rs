//! Environment registry and artifact store for Ascent.
//!
//! The registry is the static, ordered configuration of promotion
//! targets; the artifact store holds immutable bundles. Both are leaf
//! dependencies of the orchestrator: the registry is read-only during a
//! run, and the store has no logic beyond content-addressed storage.

pub mod artifact;
pub mod registry;

pub use artifact::{ArtifactStore, ArtifactStoreError, InMemoryArtifactStore};
pub use registry::{EnvironmentRegistry, RegistryError};
