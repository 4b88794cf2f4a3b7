use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    /// Largest value the key-value store accepts, mirroring a browser storage quota.
    #[serde(default)]
    pub storage_quota_bytes: Option<usize>,
    #[serde(default = "default_rows_url")]
    pub dataset_rows_url: String,
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
    #[serde(default = "default_dataset_config")]
    pub dataset_config: String,
    #[serde(default = "default_dataset_split")]
    pub dataset_split: String,
    /// File path or http(s) URL of the verified override set.
    #[serde(default)]
    pub verified_source: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_freshness_days")]
    pub freshness_days: i64,
    #[serde(default = "default_expected_remote_count")]
    pub expected_remote_count: usize,
    #[serde(default = "default_cache_format_version")]
    pub cache_format_version: String,
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_knowledge_base_title")]
    pub knowledge_base_title: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_rows_url() -> String {
    "https://datasets-server.huggingface.co/rows".to_string()
}

fn default_dataset_name() -> String {
    "millat/indian_university_guidance_for_bangladeshi_students".to_string()
}

fn default_dataset_config() -> String {
    "default".to_string()
}

fn default_dataset_split() -> String {
    "train".to_string()
}

const fn default_page_size() -> usize {
    100
}

const fn default_max_entries() -> usize {
    10_000
}

const fn default_freshness_days() -> i64 {
    7
}

const fn default_expected_remote_count() -> usize {
    1_000
}

fn default_cache_format_version() -> String {
    "kb-v2".to_string()
}

fn default_cache_key() -> String {
    "knowledge_base_cache".to_string()
}

const fn default_top_k() -> usize {
    5
}

fn default_knowledge_base_title() -> String {
    "Indian University Guidance for Bangladeshi Students".to_string()
}

const fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage: default_storage_kind(),
            storage_quota_bytes: None,
            dataset_rows_url: default_rows_url(),
            dataset_name: default_dataset_name(),
            dataset_config: default_dataset_config(),
            dataset_split: default_dataset_split(),
            verified_source: None,
            page_size: default_page_size(),
            max_entries: default_max_entries(),
            freshness_days: default_freshness_days(),
            expected_remote_count: default_expected_remote_count(),
            cache_format_version: default_cache_format_version(),
            cache_key: default_cache_key(),
            default_top_k: default_top_k(),
            knowledge_base_title: default_knowledge_base_title(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
