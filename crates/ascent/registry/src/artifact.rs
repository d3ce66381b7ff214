//! Content-addressed storage for immutable bundles.

use ascent_types::{Bundle, BundleId};
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Artifact store errors
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("Bundle not found: {0}")]
    NotFound(BundleId),

    #[error("Bundle already exists: {0}")]
    AlreadyExists(BundleId),

    #[error("Checksum mismatch for {id}: declared {declared}, computed {computed}")]
    ChecksumMismatch {
        id: BundleId,
        declared: String,
        computed: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Store of immutable bundle versions.
///
/// Bundles are write-once: `put` verifies the declared checksum against
/// the content and rejects duplicates; nothing ever mutates a stored
/// bundle.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch a bundle by id.
    async fn get(&self, id: &BundleId) -> Result<Bundle, ArtifactStoreError>;

    /// Store a new bundle after verifying its checksum.
    async fn put(&self, bundle: Bundle) -> Result<(), ArtifactStoreError>;

    /// Whether a bundle exists.
    async fn contains(&self, id: &BundleId) -> Result<bool, ArtifactStoreError>;
}

/// In-memory implementation for development and testing.
pub struct InMemoryArtifactStore {
    bundles: DashMap<BundleId, Bundle>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            bundles: DashMap::new(),
        }
    }

    /// Number of stored bundles.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn get(&self, id: &BundleId) -> Result<Bundle, ArtifactStoreError> {
        self.bundles
            .get(id)
            .map(|b| b.clone())
            .ok_or_else(|| ArtifactStoreError::NotFound(id.clone()))
    }

    async fn put(&self, bundle: Bundle) -> Result<(), ArtifactStoreError> {
        if !bundle.checksum_valid() {
            return Err(ArtifactStoreError::ChecksumMismatch {
                id: bundle.id.clone(),
                declared: bundle.checksum.clone(),
                computed: bundle.expected_checksum(),
            });
        }
        if self.bundles.contains_key(&bundle.id) {
            return Err(ArtifactStoreError::AlreadyExists(bundle.id.clone()));
        }
        self.bundles.insert(bundle.id.clone(), bundle);
        Ok(())
    }

    async fn contains(&self, id: &BundleId) -> Result<bool, ArtifactStoreError> {
        Ok(self.bundles.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn make_bundle() -> Bundle {
        let mut params = BTreeMap::new();
        params.insert("entry_point".to_string(), "main.py".to_string());
        Bundle::new("rev-abc", params)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryArtifactStore::new();
        let bundle = make_bundle();
        let id = bundle.id.clone();

        store.put(bundle).await.unwrap();

        let fetched = store.get(&id).await.unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.source_revision, "rev-abc");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryArtifactStore::new();
        let result = store.get(&BundleId::generate()).await;
        assert!(matches!(result, Err(ArtifactStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_put_rejects_duplicate() {
        let store = InMemoryArtifactStore::new();
        let bundle = make_bundle();

        store.put(bundle.clone()).await.unwrap();
        let result = store.put(bundle).await;
        assert!(matches!(result, Err(ArtifactStoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_put_rejects_bad_checksum() {
        let store = InMemoryArtifactStore::new();
        let mut bundle = make_bundle();
        bundle.checksum = "deadbeefdeadbeef".to_string();

        let result = store.put(bundle).await;
        assert!(matches!(
            result,
            Err(ArtifactStoreError::ChecksumMismatch { .. })
        ));
    }
}
