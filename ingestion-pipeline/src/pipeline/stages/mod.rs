use common::{error::AppError, storage::types::corpus::Corpus};
use state_machines::core::GuardError;
use tracing::{debug, error, info, instrument, warn};

use crate::{fetcher::fetch_from, overrides::load_overrides};

use super::{
    context::LoadContext,
    state::{
        CheckCache, EvaluateCompleteness, Fallback, FreshLoad, LoadMachine, Resident, ResumeLoad,
    },
};

pub enum CacheCheck {
    Hit(LoadMachine<(), EvaluateCompleteness>, Corpus),
    Miss(LoadMachine<(), FreshLoad>),
}

pub enum Completeness {
    Complete(LoadMachine<(), Resident>, Corpus),
    Partial(LoadMachine<(), ResumeLoad>, Corpus),
}

/// Result of a fetching stage: either a resident corpus or a hard fault that
/// moved the machine into `Fallback`.
pub enum LoadAttempt {
    Settled(LoadMachine<(), Resident>, Corpus),
    Faulted(LoadMachine<(), Fallback>, AppError),
}

#[instrument(level = "trace", skip_all)]
pub async fn check_cache(
    machine: LoadMachine<(), CheckCache>,
    ctx: &LoadContext<'_>,
) -> Result<CacheCheck, AppError> {
    match ctx.cache.read().await {
        Some(snapshot) => {
            debug!(
                entries = snapshot.corpus.len(),
                verified = snapshot.corpus.verified_count(),
                captured_at = %snapshot.captured_at,
                "knowledge base cache hit"
            );
            let machine = machine
                .hit()
                .map_err(|(_, guard)| map_guard_error("hit", &guard))?;
            Ok(CacheCheck::Hit(machine, snapshot.corpus))
        }
        None => {
            debug!("knowledge base cache miss");
            let machine = machine
                .miss()
                .map_err(|(_, guard)| map_guard_error("miss", &guard))?;
            Ok(CacheCheck::Miss(machine))
        }
    }
}

#[instrument(level = "trace", skip_all, fields(entries = corpus.len()))]
pub fn evaluate_completeness(
    machine: LoadMachine<(), EvaluateCompleteness>,
    ctx: &LoadContext<'_>,
    corpus: Corpus,
) -> Result<Completeness, AppError> {
    let expected = ctx.tuning.expected_remote_count;
    if corpus.is_complete(expected) {
        info!(
            entries = corpus.len(),
            remote = corpus.remote_count(),
            expected,
            "cached knowledge base is complete"
        );
        let machine = machine
            .accept()
            .map_err(|(_, guard)| map_guard_error("accept", &guard))?;
        return Ok(Completeness::Complete(machine, corpus));
    }

    info!(
        remote = corpus.remote_count(),
        expected,
        resume_offset = corpus.remote_count(),
        "cached knowledge base is partial; resuming fetch"
    );
    let machine = machine
        .resume()
        .map_err(|(_, guard)| map_guard_error("resume", &guard))?;
    Ok(Completeness::Partial(machine, corpus))
}

#[instrument(level = "trace", skip_all)]
pub async fn fresh_load(
    machine: LoadMachine<(), FreshLoad>,
    ctx: &LoadContext<'_>,
) -> Result<LoadAttempt, AppError> {
    let verified = load_overrides(ctx.overrides).await;

    match fetch_from(ctx.pages, 0, ctx.tuning.fetch_tuning()).await {
        Ok(outcome) => {
            let partial = outcome.is_partial();
            let end_offset = outcome.end_offset();
            let corpus = Corpus::new(verified, outcome.entries);
            ctx.cache.write(&corpus).await;
            info!(
                entries = corpus.len(),
                verified = corpus.verified_count(),
                end_offset,
                partial,
                "fresh knowledge base load finished"
            );
            let machine = machine
                .settle()
                .map_err(|(_, guard)| map_guard_error("settle", &guard))?;
            Ok(LoadAttempt::Settled(machine, corpus))
        }
        Err(err) => {
            let machine = machine
                .fall_back()
                .map_err(|(_, guard)| map_guard_error("fall_back", &guard))?;
            Ok(LoadAttempt::Faulted(machine, err))
        }
    }
}

#[instrument(level = "trace", skip_all, fields(resume_offset = corpus.remote_count()))]
pub async fn resume_load(
    machine: LoadMachine<(), ResumeLoad>,
    ctx: &LoadContext<'_>,
    mut corpus: Corpus,
) -> Result<LoadAttempt, AppError> {
    let resume_offset = corpus.remote_count();

    match fetch_from(ctx.pages, resume_offset, ctx.tuning.fetch_tuning()).await {
        Ok(outcome) => {
            let fetched = outcome.entries.len();
            let partial = outcome.is_partial();
            let end_offset = outcome.end_offset();
            // An unchanged snapshot keeps its capture time so it can still expire.
            if fetched > 0 {
                corpus.append_remote(outcome.entries);
                ctx.cache.write(&corpus).await;
            } else {
                debug!(resume_offset, "resumed fetch added nothing; cache left as is");
            }
            info!(
                resume_offset,
                end_offset,
                fetched,
                entries = corpus.len(),
                partial,
                "resumed knowledge base load finished"
            );
            let machine = machine
                .settle()
                .map_err(|(_, guard)| map_guard_error("settle", &guard))?;
            Ok(LoadAttempt::Settled(machine, corpus))
        }
        Err(err) => {
            let machine = machine
                .fall_back()
                .map_err(|(_, guard)| map_guard_error("fall_back", &guard))?;
            Ok(LoadAttempt::Faulted(machine, err))
        }
    }
}

/// Stale cache, then overrides alone, then an empty corpus.
#[instrument(level = "trace", skip_all)]
pub async fn fallback(
    machine: LoadMachine<(), Fallback>,
    ctx: &LoadContext<'_>,
    cause: &AppError,
) -> Result<(LoadMachine<(), Resident>, Corpus), AppError> {
    error!(error = %cause, "knowledge base load failed; entering fallback");

    let corpus = if let Some(snapshot) = ctx.cache.read_stale().await {
        warn!(
            entries = snapshot.corpus.len(),
            captured_at = %snapshot.captured_at,
            "serving stale knowledge base snapshot"
        );
        snapshot.corpus
    } else {
        let verified = load_overrides(ctx.overrides).await;
        if verified.is_empty() {
            warn!("no stale snapshot or overrides available; knowledge base is empty");
        } else {
            warn!(verified = verified.len(), "serving verified overrides only");
        }
        Corpus::verified_only(verified)
    };

    let machine = machine
        .settle()
        .map_err(|(_, guard)| map_guard_error("settle", &guard))?;
    Ok((machine, corpus))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid knowledge base load transition during {event}: {guard:?}"
    ))
}
