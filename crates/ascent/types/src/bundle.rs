//! The immutable bundle artifact.

use crate::ids::BundleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable, versioned deployment artifact.
///
/// A bundle is created once per build and never mutated; promotion runs
/// reference it by id only. The checksum is a hex digest over the
/// canonical content fields and is verified by the artifact store on
/// `put`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Unique bundle identifier
    pub id: BundleId,
    /// Source-control revision the bundle was built from
    pub source_revision: String,
    /// Hex digest over the canonical content fields
    pub checksum: String,
    /// Build timestamp
    pub created_at: DateTime<Utc>,
    /// Build parameters (BTreeMap for a stable canonical order)
    pub parameters: BTreeMap<String, String>,
}

impl Bundle {
    /// Create a bundle with a checksum computed over its content fields.
    pub fn new(source_revision: impl Into<String>, parameters: BTreeMap<String, String>) -> Self {
        let source_revision = source_revision.into();
        let checksum = content_checksum(&source_revision, &parameters);
        Self {
            id: BundleId::generate(),
            source_revision,
            checksum,
            created_at: Utc::now(),
            parameters,
        }
    }

    /// Recompute the checksum from the current content fields.
    pub fn expected_checksum(&self) -> String {
        content_checksum(&self.source_revision, &self.parameters)
    }

    /// Whether the declared checksum matches the content fields.
    pub fn checksum_valid(&self) -> bool {
        self.checksum == self.expected_checksum()
    }
}

/// Blake3 hex digest over the canonical serialization of the content
/// fields: source revision, then each parameter pair with unit/record
/// separators so key and value boundaries are unambiguous.
fn content_checksum(source_revision: &str, parameters: &BTreeMap<String, String>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"ascent-bundle-v1:");
    hasher.update(source_revision.as_bytes());
    for (key, value) in parameters {
        hasher.update(b"\x1f");
        hasher.update(key.as_bytes());
        hasher.update(b"\x1e");
        hasher.update(value.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
