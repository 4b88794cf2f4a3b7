use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::corpus::Corpus;

/// Persisted capture of the merged corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub format_version: String,
    pub captured_at: DateTime<Utc>,
    pub corpus: Corpus,
}

/// Why a stored snapshot cannot be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRejection {
    VersionMismatch,
    Expired,
    Malformed,
}

impl CacheSnapshot {
    pub fn capture(format_version: impl Into<String>, corpus: Corpus) -> Self {
        Self {
            format_version: format_version.into(),
            captured_at: Utc::now(),
            corpus,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
    }

    pub fn is_expired(&self, freshness_window: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > freshness_window
    }

    /// Checks shape and version; freshness is checked only when `freshness_window` is given.
    pub fn validate(
        &self,
        expected_version: &str,
        freshness_window: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<(), SnapshotRejection> {
        if !self.corpus.is_well_formed() {
            return Err(SnapshotRejection::Malformed);
        }
        if self.format_version != expected_version {
            return Err(SnapshotRejection::VersionMismatch);
        }
        if let Some(window) = freshness_window {
            if self.is_expired(window, now) {
                return Err(SnapshotRejection::Expired);
            }
        }
        Ok(())
    }
}
