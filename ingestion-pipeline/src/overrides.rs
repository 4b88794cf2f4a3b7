use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use common::{
    error::AppError, storage::types::knowledge_entry::KnowledgeEntry, utils::config::AppConfig,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

/// Context label carried by every verified override entry.
pub const VERIFIED_CONTEXT: &str = "Verified Official Information";
/// Source label carried by every verified override entry.
pub const VERIFIED_SOURCE: &str = "Verified Override Set";

/// A raw item of the verified override resource.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOverride {
    pub question: String,
    pub answer: String,
}

/// Supplier of the authoritative override set.
#[async_trait]
pub trait OverrideSource: Send + Sync {
    async fn fetch_raw(&self) -> Result<Vec<RawOverride>, AppError>;
}

/// Override set stored as a JSON array on disk.
pub struct FileOverrideSource {
    path: PathBuf,
}

impl FileOverrideSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OverrideSource for FileOverrideSource {
    async fn fetch_raw(&self) -> Result<Vec<RawOverride>, AppError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    AppError::NotFound(format!("override file {}", self.path.display()))
                }
                _ => AppError::Io(err),
            })?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Override set served as a JSON array over HTTP.
pub struct HttpOverrideSource {
    client: Client,
    url: Url,
}

impl HttpOverrideSource {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl OverrideSource for HttpOverrideSource {
    async fn fetch_raw(&self) -> Result<Vec<RawOverride>, AppError> {
        let response = self.client.get(self.url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("override resource {}", self.url)));
        }
        let body = response.error_for_status()?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Used when no override resource is configured.
pub struct NoOverrides;

#[async_trait]
impl OverrideSource for NoOverrides {
    async fn fetch_raw(&self) -> Result<Vec<RawOverride>, AppError> {
        Ok(Vec::new())
    }
}

/// Picks the override source from `verified_source`: http(s) URLs are fetched,
/// anything else is read as a file path.
pub fn source_from_config(config: &AppConfig, client: Client) -> Arc<dyn OverrideSource> {
    match config.verified_source.as_deref().map(str::trim) {
        None | Some("") => Arc::new(NoOverrides),
        Some(location) => match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                Arc::new(HttpOverrideSource::new(client, url))
            }
            _ => Arc::new(FileOverrideSource::new(location)),
        },
    }
}

/// Loads and normalizes the override set. Never fails: any problem is logged
/// and yields an empty set.
pub async fn load_overrides(source: &dyn OverrideSource) -> Vec<KnowledgeEntry> {
    match source.fetch_raw().await {
        Ok(raw) => {
            let entries = normalize_overrides(raw);
            info!(verified = entries.len(), "loaded verified overrides");
            entries
        }
        Err(err) => {
            warn!(error = %err, "verified overrides unavailable; continuing without them");
            Vec::new()
        }
    }
}

pub fn normalize_overrides(raw: Vec<RawOverride>) -> Vec<KnowledgeEntry> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            if item.question.trim().is_empty() || item.answer.trim().is_empty() {
                warn!(index, "skipping verified override with blank question or answer");
                return None;
            }
            Some(
                KnowledgeEntry::new(item.question, item.answer)
                    .with_context(VERIFIED_CONTEXT)
                    .with_source(VERIFIED_SOURCE),
            )
        })
        .collect()
}
