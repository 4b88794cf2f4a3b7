use std::time::Duration;

use async_trait::async_trait;
use common::{
    error::AppError, storage::types::knowledge_entry::KnowledgeEntry, utils::config::AppConfig,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("page request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("page request returned status {0}")]
    Status(StatusCode),
    #[error("malformed page payload: {0}")]
    Payload(String),
    #[error("remote source unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Page-level failures end the current fetch run and nothing more.
    /// `Unavailable` means the source itself cannot be used.
    pub const fn is_page_error(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

/// A remote tabular source readable in `(offset, limit)` pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, FetchError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FetchTuning {
    pub page_size: usize,
    /// Ceiling on the absolute bulk offset; a resumed run counts earlier entries too.
    pub max_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStop {
    /// A short or empty page marked the end of the source.
    Exhausted,
    /// The configured entry ceiling was reached.
    CeilingReached,
    /// A page failed; everything before it was kept.
    Interrupted { offset: usize, reason: String },
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub start_offset: usize,
    pub entries: Vec<KnowledgeEntry>,
    pub stop: FetchStop,
}

impl FetchOutcome {
    pub const fn is_partial(&self) -> bool {
        matches!(self.stop, FetchStop::Interrupted { .. })
    }

    /// Offset directly after the last fetched entry.
    pub fn end_offset(&self) -> usize {
        self.start_offset.saturating_add(self.entries.len())
    }
}

/// Reads pages from `start_offset` until the source runs dry, a page fails or
/// the ceiling is hit. Failed pages are never retried.
///
/// Only an unavailable source is returned as an error.
#[instrument(skip_all, fields(start_offset = start_offset, page_size = tuning.page_size))]
pub async fn fetch_from(
    source: &dyn PageSource,
    start_offset: usize,
    tuning: FetchTuning,
) -> Result<FetchOutcome, AppError> {
    let page_size = tuning.page_size.max(1);
    let mut entries = Vec::new();
    let mut offset = start_offset;

    let stop = loop {
        let remaining = tuning.max_entries.saturating_sub(offset);
        if remaining == 0 {
            break FetchStop::CeilingReached;
        }
        let limit = page_size.min(remaining);

        match source.fetch_page(offset, limit).await {
            Ok(page) => {
                let received = page.len().min(limit);
                entries.extend(page.into_iter().take(limit));
                offset = offset.saturating_add(received);
                debug!(offset, received, limit, "fetched dataset page");
                if received < limit {
                    break FetchStop::Exhausted;
                }
            }
            Err(err) if err.is_page_error() => {
                warn!(
                    offset,
                    error = %err,
                    "dataset page failed; keeping entries fetched so far"
                );
                break FetchStop::Interrupted {
                    offset,
                    reason: err.to_string(),
                };
            }
            Err(err) => return Err(AppError::RemoteUnavailable(err.to_string())),
        }
    };

    info!(
        start_offset,
        fetched = entries.len(),
        stop = ?stop,
        "dataset fetch run finished"
    );

    Ok(FetchOutcome {
        start_offset,
        entries,
        stop,
    })
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    rows: Vec<RowEnvelope>,
    #[serde(default)]
    num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RowEnvelope {
    row: KnowledgeEntry,
}

/// Page source backed by the Hugging Face datasets-server `rows` endpoint.
#[derive(Clone)]
pub struct DatasetRowsSource {
    client: Client,
    rows_url: Url,
    dataset: String,
    config: String,
    split: String,
}

impl DatasetRowsSource {
    pub fn new(
        client: Client,
        rows_url: &str,
        dataset: impl Into<String>,
        config: impl Into<String>,
        split: impl Into<String>,
    ) -> Result<Self, AppError> {
        let rows_url = Url::parse(rows_url)
            .map_err(|err| AppError::Validation(format!("invalid dataset rows url: {err}")))?;
        match rows_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::Validation(format!(
                    "unsupported dataset rows url scheme '{scheme}'"
                )))
            }
        }

        Ok(Self {
            client,
            rows_url,
            dataset: dataset.into(),
            config: config.into(),
            split: split.into(),
        })
    }

    pub fn from_config(config: &AppConfig, client: Client) -> Result<Self, AppError> {
        Self::new(
            client,
            &config.dataset_rows_url,
            config.dataset_name.clone(),
            config.dataset_config.clone(),
            config.dataset_split.clone(),
        )
    }

    pub fn page_url(&self, offset: usize, limit: usize) -> Url {
        let mut url = self.rows_url.clone();
        url.query_pairs_mut()
            .append_pair("dataset", &self.dataset)
            .append_pair("config", &self.config)
            .append_pair("split", &self.split)
            .append_pair("offset", &offset.to_string())
            .append_pair("length", &limit.to_string());
        url
    }
}

/// HTTP client shared by the dataset and override sources.
pub fn build_http_client(config: &AppConfig) -> Result<Client, AppError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?)
}

fn parse_rows_page(body: &str) -> Result<RowsPage, FetchError> {
    serde_json::from_str(body).map_err(|err| FetchError::Payload(err.to_string()))
}

#[async_trait]
impl PageSource for DatasetRowsSource {
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, FetchError> {
        let url = self.page_url(offset, limit);
        let response = self.client.get(url).send().await.map_err(|err| {
            if err.is_builder() {
                FetchError::Unavailable(err.to_string())
            } else {
                FetchError::Request(err)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        let page = parse_rows_page(&body)?;
        debug!(
            offset,
            rows = page.rows.len(),
            num_rows_total = ?page.num_rows_total,
            "decoded dataset rows page"
        );

        Ok(page.rows.into_iter().map(|envelope| envelope.row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    fn entry(index: usize) -> KnowledgeEntry {
        KnowledgeEntry::new(format!("question {index}"), format!("answer {index}"))
    }

    /// Serves `total` synthetic rows; offsets listed in `failing` return an error.
    struct ScriptedSource {
        total: usize,
        failing: HashMap<usize, fn() -> FetchError>,
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl ScriptedSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                failing: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_at(mut self, offset: usize, error: fn() -> FetchError) -> Self {
            self.failing.insert(offset, error);
            self
        }

        async fn calls(&self) -> Vec<(usize, usize)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(
            &self,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<KnowledgeEntry>, FetchError> {
            self.calls.lock().await.push((offset, limit));
            if let Some(error) = self.failing.get(&offset) {
                return Err(error());
            }
            let end = offset.saturating_add(limit).min(self.total);
            Ok((offset..end).map(entry).collect())
        }
    }

    fn tuning(page_size: usize, max_entries: usize) -> FetchTuning {
        FetchTuning {
            page_size,
            max_entries,
        }
    }

    #[tokio::test]
    async fn test_short_page_ends_the_run() {
        let source = ScriptedSource::new(250);
        let outcome = fetch_from(&source, 0, tuning(100, 10_000))
            .await
            .expect("fetch run");

        assert_eq!(outcome.entries.len(), 250);
        assert_eq!(outcome.stop, FetchStop::Exhausted);
        assert_eq!(
            source.calls().await,
            vec![(0, 100), (100, 100), (200, 100)]
        );
    }

    #[tokio::test]
    async fn test_empty_page_ends_the_run() {
        let source = ScriptedSource::new(200);
        let outcome = fetch_from(&source, 0, tuning(100, 10_000))
            .await
            .expect("fetch run");

        assert_eq!(outcome.entries.len(), 200);
        assert_eq!(outcome.stop, FetchStop::Exhausted);
        assert_eq!(source.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_earlier_pages_without_retry() {
        let source = ScriptedSource::new(1_000)
            .failing_at(100, || FetchError::Status(StatusCode::BAD_GATEWAY));
        let outcome = fetch_from(&source, 0, tuning(100, 10_000))
            .await
            .expect("page failures are not errors");

        assert_eq!(outcome.entries.len(), 100);
        assert!(outcome.is_partial());
        assert!(matches!(
            outcome.stop,
            FetchStop::Interrupted { offset: 100, .. }
        ));
        assert_eq!(source.calls().await, vec![(0, 100), (100, 100)]);
    }

    #[tokio::test]
    async fn test_ceiling_stops_the_run_and_trims_last_request() {
        let source = ScriptedSource::new(1_000);
        let outcome = fetch_from(&source, 0, tuning(100, 250))
            .await
            .expect("fetch run");

        assert_eq!(outcome.entries.len(), 250);
        assert_eq!(outcome.stop, FetchStop::CeilingReached);
        assert_eq!(
            source.calls().await,
            vec![(0, 100), (100, 100), (200, 50)]
        );
    }

    #[tokio::test]
    async fn test_resumed_run_starts_at_offset_and_counts_toward_ceiling() {
        let source = ScriptedSource::new(1_000);
        let outcome = fetch_from(&source, 40, tuning(100, 200))
            .await
            .expect("fetch run");

        assert_eq!(outcome.start_offset, 40);
        assert_eq!(outcome.end_offset(), 200);
        assert_eq!(
            outcome.entries.first().map(|e| e.question.as_str()),
            Some("question 40")
        );
        assert_eq!(source.calls().await, vec![(40, 100), (140, 60)]);
    }

    #[tokio::test]
    async fn test_start_beyond_ceiling_makes_no_requests() {
        let source = ScriptedSource::new(1_000);
        let outcome = fetch_from(&source, 500, tuning(100, 500))
            .await
            .expect("fetch run");

        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.stop, FetchStop::CeilingReached);
        assert!(source.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_source_is_a_hard_error() {
        let source = ScriptedSource::new(1_000)
            .failing_at(0, || FetchError::Unavailable("client unusable".into()));
        let result = fetch_from(&source, 0, tuning(100, 10_000)).await;

        assert!(matches!(result, Err(AppError::RemoteUnavailable(_))));
    }

    #[test]
    fn test_page_url_carries_dataset_and_paging_parameters() {
        let source = DatasetRowsSource::new(
            Client::new(),
            "https://datasets-server.huggingface.co/rows",
            "owner/name",
            "default",
            "train",
        )
        .expect("valid source");

        let url = source.page_url(200, 100);
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/rows");
        assert_eq!(pairs.get("dataset").map(String::as_str), Some("owner/name"));
        assert_eq!(pairs.get("split").map(String::as_str), Some("train"));
        assert_eq!(pairs.get("offset").map(String::as_str), Some("200"));
        assert_eq!(pairs.get("length").map(String::as_str), Some("100"));
    }

    #[test]
    fn test_invalid_rows_url_is_rejected() {
        assert!(matches!(
            DatasetRowsSource::new(Client::new(), "ftp://example.com/rows", "d", "c", "s"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            DatasetRowsSource::new(Client::new(), "not a url", "d", "c", "s"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rows_payload_is_decoded_in_order() {
        let body = r#"{
            "features": [],
            "rows": [
                {"row_idx": 0, "row": {"question": "q0", "answer": "a0", "context": "Fees"}},
                {"row_idx": 1, "row": {"question": "q1", "answer": "a1", "source": null}}
            ],
            "num_rows_total": 2
        }"#;

        let page = parse_rows_page(body).expect("payload parses");
        assert_eq!(page.num_rows_total, Some(2));
        let questions: Vec<_> = page.rows.iter().map(|r| r.row.question.as_str()).collect();
        assert_eq!(questions, vec!["q0", "q1"]);
        assert_eq!(page.rows.first().and_then(|r| r.row.context_label()), Some("Fees"));
    }

    #[test]
    fn test_malformed_payload_is_a_page_error() {
        let err = parse_rows_page("{\"rows\": [{\"row\": {\"question\": 1}}]}")
            .expect_err("malformed payload");
        assert!(matches!(err, FetchError::Payload(_)));
        assert!(err.is_page_error());
    }

    fn loopback_source(base: &str) -> DatasetRowsSource {
        let rows_url = format!("{base}/rows");
        DatasetRowsSource::new(Client::new(), &rows_url, "owner/name", "default", "train")
            .expect("loopback source")
    }

    #[tokio::test]
    async fn test_http_page_is_requested_and_decoded_in_order() {
        let body = r#"{"rows": [
            {"row_idx": 40, "row": {"question": "q40", "answer": "a40"}},
            {"row_idx": 41, "row": {"question": "q41", "answer": "a41"}}
        ], "num_rows_total": 42}"#;
        let (base, request) = crate::test_http::serve_once(200, body).await;
        let source = loopback_source(&base);

        let entries = source.fetch_page(40, 2).await.expect("page served");

        let questions: Vec<_> = entries.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q40", "q41"]);
        let request_line = request.await.expect("request line");
        assert!(request_line.starts_with("GET /rows?"));
        assert!(request_line.contains("offset=40"));
        assert!(request_line.contains("length=2"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_a_page_error() {
        let (base, _request) = crate::test_http::serve_once(500, "{}").await;
        let source = loopback_source(&base);

        let err = source.fetch_page(0, 100).await.expect_err("server error");

        assert!(matches!(err, FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR)));
        assert!(err.is_page_error());
    }

    #[tokio::test]
    async fn test_http_garbage_body_is_a_page_error() {
        let (base, _request) = crate::test_http::serve_once(200, "<html>busy</html>").await;
        let source = loopback_source(&base);

        let err = source.fetch_page(0, 100).await.expect_err("undecodable body");

        assert!(matches!(err, FetchError::Payload(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_page_error() {
        let source = loopback_source(&crate::test_http::closed_port().await);

        let err = source.fetch_page(0, 100).await.expect_err("connection refused");

        assert!(matches!(err, FetchError::Request(_)));
        assert!(err.is_page_error());
    }

    #[tokio::test]
    async fn test_http_failure_ends_run_as_partial_not_unavailable() {
        let (base, _request) = crate::test_http::serve_once(503, "{}").await;
        let source = loopback_source(&base);

        let outcome = fetch_from(&source, 0, tuning(100, 10_000))
            .await
            .expect("page failures are not errors");

        assert!(outcome.entries.is_empty());
        assert!(matches!(outcome.stop, FetchStop::Interrupted { offset: 0, .. }));
    }
}
