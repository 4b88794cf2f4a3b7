use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{
    error::AppError,
    storage::{
        kv::{KeyValueStore, StoreError},
        types::{cache_snapshot::CacheSnapshot, corpus::Corpus},
    },
};
use tracing::{debug, info, warn};

/// Single-key snapshot store for the merged corpus.
///
/// Every operation fails soft: problems are logged and reported as an absent
/// snapshot or a skipped write, never as an error.
#[derive(Clone)]
pub struct CacheStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    format_version: String,
    freshness_window: Duration,
}

impl CacheStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        format_version: impl Into<String>,
        freshness_window: Duration,
    ) -> Self {
        Self {
            kv,
            key: key.into(),
            format_version: format_version.into(),
            freshness_window,
        }
    }

    /// Returns the stored snapshot if it is well-formed, carries the expected
    /// format version and is within the freshness window. Anything else is
    /// deleted and reported as absent.
    pub async fn read(&self) -> Option<CacheSnapshot> {
        let snapshot = self.decode().await?;
        match snapshot.validate(
            &self.format_version,
            Some(self.freshness_window),
            Utc::now(),
        ) {
            Ok(()) => {
                debug!(
                    entries = snapshot.corpus.len(),
                    captured_at = %snapshot.captured_at,
                    "cache snapshot accepted"
                );
                Some(snapshot)
            }
            Err(rejection) => {
                info!(
                    ?rejection,
                    format_version = %snapshot.format_version,
                    captured_at = %snapshot.captured_at,
                    "discarding untrusted cache snapshot"
                );
                self.clear().await;
                None
            }
        }
    }

    /// Like [`CacheStore::read`] but accepts expired snapshots and leaves
    /// undecodable JSON in place. Version mismatches are still rejected, and a
    /// value that is not valid UTF-8 is discarded as in `read`.
    pub async fn read_stale(&self) -> Option<CacheSnapshot> {
        let raw = self.fetch_raw().await?;
        let snapshot: CacheSnapshot = serde_json::from_str(&raw).ok()?;
        match snapshot.validate(&self.format_version, None, Utc::now()) {
            Ok(()) => Some(snapshot),
            Err(rejection) => {
                debug!(?rejection, "stale cache snapshot unusable");
                None
            }
        }
    }

    /// Persists `corpus` under the cache key. Returns whether the write landed.
    pub async fn write(&self, corpus: &Corpus) -> bool {
        match self.try_write(corpus).await {
            Ok(bytes) => {
                debug!(entries = corpus.len(), bytes, "cache snapshot written");
                true
            }
            Err(err) => {
                warn!(
                    error = %err,
                    entries = corpus.len(),
                    "cache snapshot not persisted; continuing with in-memory corpus"
                );
                false
            }
        }
    }

    /// Deletes the stored snapshot unconditionally.
    pub async fn clear(&self) {
        if let Err(err) = self.kv.remove(&self.key).await {
            warn!(error = %err, key = %self.key, "failed to delete cache snapshot");
        }
    }

    async fn try_write(&self, corpus: &Corpus) -> Result<usize, AppError> {
        let snapshot = CacheSnapshot::capture(self.format_version.clone(), corpus.clone());
        let payload = serde_json::to_string(&snapshot)?;
        let bytes = payload.len();
        self.kv.set(&self.key, payload).await?;
        Ok(bytes)
    }

    async fn fetch_raw(&self) -> Option<String> {
        match self.kv.get(&self.key).await {
            Ok(raw) => raw,
            Err(StoreError::Encoding(err)) => {
                warn!(error = %err, "cache snapshot is not valid text; discarding");
                self.clear().await;
                None
            }
            Err(err) => {
                warn!(error = %err, "cache snapshot could not be read; treating as absent");
                None
            }
        }
    }

    async fn decode(&self) -> Option<CacheSnapshot> {
        let raw = self.fetch_raw().await?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(error = %err, "cache snapshot is corrupt; discarding");
                self.clear().await;
                None
            }
        }
    }
}
