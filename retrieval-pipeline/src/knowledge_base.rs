use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use common::storage::types::{corpus::Corpus, knowledge_entry::KnowledgeEntry};
use ingestion_pipeline::LoadPipeline;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing::{debug, info, instrument};

use crate::{
    answer_retrieval::{build_context, create_user_message, knowledge_base_digest},
    scoring::{rank, LexicalWeights},
};

type ResidentCell = Arc<OnceCell<Arc<Corpus>>>;

/// Caller-owned handle to the resident corpus.
///
/// The first call to [`KnowledgeBase::ensure_loaded`] runs the load pipeline;
/// callers arriving while it runs wait on the same load. Afterwards the corpus
/// is served from memory. At most one pipeline run is in flight at any time,
/// refreshes included.
pub struct KnowledgeBase {
    pipeline: LoadPipeline,
    resident: Mutex<ResidentCell>,
    /// Held for the duration of every pipeline run.
    loading: AsyncMutex<()>,
    /// Serialises refreshes.
    refreshing: AsyncMutex<()>,
    generation: AtomicU64,
    default_top_k: usize,
    title: String,
    weights: LexicalWeights,
}

impl KnowledgeBase {
    pub fn new(pipeline: LoadPipeline, default_top_k: usize, title: impl Into<String>) -> Self {
        Self {
            pipeline,
            resident: Mutex::new(Arc::new(OnceCell::new())),
            loading: AsyncMutex::new(()),
            refreshing: AsyncMutex::new(()),
            generation: AtomicU64::new(0),
            default_top_k,
            title: title.into(),
            weights: LexicalWeights::default(),
        }
    }

    fn current_cell(&self) -> ResidentCell {
        let guard = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Returns the resident corpus, loading it first if needed. Never fails.
    pub async fn ensure_loaded(&self) -> Arc<Corpus> {
        let cell = self.current_cell();
        let corpus = cell
            .get_or_init(|| async {
                let _running = self.loading.lock().await;
                let outcome = self.pipeline.run().await;
                Arc::new(outcome.corpus)
            })
            .await;
        Arc::clone(corpus)
    }

    /// Drops the persisted snapshot and the resident corpus, then loads again.
    ///
    /// A load already in flight finishes before the snapshot is cleared.
    /// Callers that overlap a refresh share its result.
    #[instrument(skip_all)]
    pub async fn force_refresh(&self) -> Arc<Corpus> {
        let requested_at = self.generation.load(Ordering::Acquire);
        let _refresh = self.refreshing.lock().await;
        if self.generation.load(Ordering::Acquire) != requested_at {
            debug!("joining a refresh that completed while waiting");
            return self.ensure_loaded().await;
        }

        {
            let _running = self.loading.lock().await;
            self.pipeline.cache().clear().await;
            let mut guard = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::new(OnceCell::new());
        }
        info!("knowledge base refresh requested");

        let corpus = self.ensure_loaded().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        corpus
    }

    /// Top `top_k` entries for `query`, falling back to the configured default.
    #[instrument(skip_all, fields(top_k))]
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Vec<KnowledgeEntry> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        tracing::Span::current().record("top_k", top_k);

        let corpus = self.ensure_loaded().await;
        let ranked: Vec<KnowledgeEntry> = rank(query, corpus.entries(), top_k, self.weights)
            .into_iter()
            .map(|scored| scored.item.clone())
            .collect();
        debug!(
            corpus_entries = corpus.len(),
            returned = ranked.len(),
            "knowledge base search finished"
        );
        ranked
    }

    pub fn build_context(entries: &[KnowledgeEntry]) -> String {
        build_context(entries)
    }

    pub async fn augmented_message(&self, query: &str, top_k: Option<usize>) -> String {
        let entries = self.search(query, top_k).await;
        create_user_message(query, &entries)
    }

    pub async fn digest(&self, max_entries: usize) -> String {
        let corpus = self.ensure_loaded().await;
        knowledge_base_digest(corpus.entries(), max_entries, &self.title)
    }
}
