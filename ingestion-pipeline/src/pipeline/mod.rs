mod config;
mod context;
mod stages;
mod state;

pub use config::LoadTuning;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{kv::KeyValueStore, types::corpus::Corpus},
};
use tracing::{error, info};

use crate::{cache::CacheStore, fetcher::PageSource, overrides::OverrideSource};

use self::{
    context::LoadContext,
    stages::{
        check_cache, evaluate_completeness, fallback, fresh_load, resume_load, CacheCheck,
        Completeness, LoadAttempt,
    },
};

/// How the resident corpus was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPath {
    /// A fresh, complete snapshot; no network traffic.
    Cached,
    /// Overrides plus a fetch from offset zero.
    Fresh,
    /// A partial snapshot extended from its bulk offset.
    Resumed,
    /// Stale snapshot, overrides only, or empty after a hard fault.
    Fallback,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub corpus: Corpus,
    pub path: LoadPath,
}

/// Drives the cache/fetch reconciliation that produces the resident corpus.
#[allow(clippy::module_name_repetitions)]
pub struct LoadPipeline {
    cache: CacheStore,
    pages: Arc<dyn PageSource>,
    overrides: Arc<dyn OverrideSource>,
    tuning: LoadTuning,
}

impl LoadPipeline {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        pages: Arc<dyn PageSource>,
        overrides: Arc<dyn OverrideSource>,
        tuning: LoadTuning,
    ) -> Self {
        let cache = CacheStore::new(
            kv,
            tuning.cache_key.clone(),
            tuning.cache_format_version.clone(),
            tuning.freshness_window(),
        );
        Self {
            cache,
            pages,
            overrides,
            tuning,
        }
    }

    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Produces a corpus. Never fails; the worst case is an empty corpus.
    #[tracing::instrument(
        skip_all,
        fields(cache_format_version = %self.tuning.cache_format_version)
    )]
    pub async fn run(&self) -> LoadOutcome {
        let ctx = LoadContext::new(
            &self.cache,
            self.pages.as_ref(),
            self.overrides.as_ref(),
            &self.tuning,
        );

        let outcome = match self.drive(&ctx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    error = %err,
                    "knowledge base load aborted; continuing with an empty corpus"
                );
                LoadOutcome {
                    corpus: Corpus::default(),
                    path: LoadPath::Fallback,
                }
            }
        };

        info!(
            path = ?outcome.path,
            entries = outcome.corpus.len(),
            verified = outcome.corpus.verified_count(),
            total_ms = ctx.elapsed_ms(),
            "knowledge base resident"
        );
        outcome
    }

    async fn drive(&self, ctx: &LoadContext<'_>) -> Result<LoadOutcome, AppError> {
        let machine = state::check_cache();

        let (attempt, path) = match check_cache(machine, ctx).await? {
            CacheCheck::Hit(machine, corpus) => match evaluate_completeness(machine, ctx, corpus)? {
                Completeness::Complete(_machine, corpus) => {
                    return Ok(LoadOutcome {
                        corpus,
                        path: LoadPath::Cached,
                    });
                }
                Completeness::Partial(machine, corpus) => {
                    (resume_load(machine, ctx, corpus).await?, LoadPath::Resumed)
                }
            },
            CacheCheck::Miss(machine) => (fresh_load(machine, ctx).await?, LoadPath::Fresh),
        };

        match attempt {
            LoadAttempt::Settled(_machine, corpus) => Ok(LoadOutcome { corpus, path }),
            LoadAttempt::Faulted(machine, cause) => {
                let (_machine, corpus) = fallback(machine, ctx, &cause).await?;
                Ok(LoadOutcome {
                    corpus,
                    path: LoadPath::Fallback,
                })
            }
        }
    }
}
