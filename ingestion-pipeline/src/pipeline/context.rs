use std::time::Instant;

use crate::{cache::CacheStore, fetcher::PageSource, overrides::OverrideSource};

use super::config::LoadTuning;

pub struct LoadContext<'a> {
    pub cache: &'a CacheStore,
    pub pages: &'a dyn PageSource,
    pub overrides: &'a dyn OverrideSource,
    pub tuning: &'a LoadTuning,
    pub started: Instant,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        cache: &'a CacheStore,
        pages: &'a dyn PageSource,
        overrides: &'a dyn OverrideSource,
        tuning: &'a LoadTuning,
    ) -> Self {
        Self {
            cache,
            pages,
            overrides,
            tuning,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
