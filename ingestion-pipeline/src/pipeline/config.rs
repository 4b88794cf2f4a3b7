use chrono::Duration;
use common::utils::config::AppConfig;

use crate::fetcher::FetchTuning;

/// Tunables for acquiring, caching and reconciling the corpus.
#[derive(Debug, Clone)]
pub struct LoadTuning {
    pub page_size: usize,
    pub max_entries: usize,
    pub freshness_days: i64,
    pub expected_remote_count: usize,
    pub cache_format_version: String,
    pub cache_key: String,
}

impl Default for LoadTuning {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_entries: 10_000,
            freshness_days: 7,
            expected_remote_count: 1_000,
            cache_format_version: "kb-v2".to_string(),
            cache_key: "knowledge_base_cache".to_string(),
        }
    }
}

impl LoadTuning {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_entries: config.max_entries,
            freshness_days: config.freshness_days,
            expected_remote_count: config.expected_remote_count,
            cache_format_version: config.cache_format_version.clone(),
            cache_key: config.cache_key.clone(),
        }
    }

    pub const fn fetch_tuning(&self) -> FetchTuning {
        FetchTuning {
            page_size: self.page_size,
            max_entries: self.max_entries,
        }
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::try_days(self.freshness_days.max(0)).unwrap_or(Duration::MAX)
    }
}
