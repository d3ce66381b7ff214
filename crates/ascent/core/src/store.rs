//! Run state persistence.

use ascent_types::{BundleId, PromotionRun, RunId};
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Run store errors
#[derive(Debug, Error)]
pub enum RunStoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Persistence seam for promotion runs.
///
/// `save` is a full-record upsert: callers re-read the record on every
/// operation, so recovery after a crash resumes from whatever was last
/// durably written.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Save (create or replace) a run record.
    async fn save(&self, run: &PromotionRun) -> Result<(), RunStoreError>;

    /// Get a run by id.
    async fn get(&self, id: &RunId) -> Result<Option<PromotionRun>, RunStoreError>;

    /// The non-terminal run for a bundle, if any. Backs the one-active-
    /// run-per-bundle uniqueness check.
    async fn active_run_for_bundle(
        &self,
        bundle_id: &BundleId,
    ) -> Result<Option<RunId>, RunStoreError>;

    /// All runs, newest first.
    async fn list(&self) -> Result<Vec<PromotionRun>, RunStoreError>;
}

/// In-memory implementation for development and testing.
pub struct InMemoryRunStore {
    runs: DashMap<RunId, PromotionRun>,
    by_bundle: DashMap<BundleId, Vec<RunId>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
            by_bundle: DashMap::new(),
        }
    }

    /// Total runs stored.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(&self, run: &PromotionRun) -> Result<(), RunStoreError> {
        let is_new = !self.runs.contains_key(&run.run_id);
        self.runs.insert(run.run_id.clone(), run.clone());
        if is_new {
            self.by_bundle
                .entry(run.bundle_id.clone())
                .or_default()
                .push(run.run_id.clone());
        }
        Ok(())
    }

    async fn get(&self, id: &RunId) -> Result<Option<PromotionRun>, RunStoreError> {
        Ok(self.runs.get(id).map(|r| r.clone()))
    }

    async fn active_run_for_bundle(
        &self,
        bundle_id: &BundleId,
    ) -> Result<Option<RunId>, RunStoreError> {
        if let Some(run_ids) = self.by_bundle.get(bundle_id) {
            for run_id in run_ids.iter() {
                if let Some(run) = self.runs.get(run_id) {
                    if !run.status.is_terminal() {
                        return Ok(Some(run_id.clone()));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<PromotionRun>, RunStoreError> {
        let mut runs: Vec<PromotionRun> = self.runs.iter().map(|r| r.clone()).collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}
