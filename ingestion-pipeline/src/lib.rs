#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod cache;
pub mod fetcher;
pub mod overrides;
pub mod pipeline;

#[cfg(test)]
mod test_http;

pub use cache::CacheStore;
pub use fetcher::{fetch_from, DatasetRowsSource, FetchError, FetchOutcome, FetchStop, PageSource};
pub use overrides::{load_overrides, OverrideSource, VERIFIED_CONTEXT, VERIFIED_SOURCE};
pub use pipeline::{LoadOutcome, LoadPath, LoadPipeline, LoadTuning};
