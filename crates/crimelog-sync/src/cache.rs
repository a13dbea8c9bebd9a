//! Short-lived cache of the last computed dataset summary.
//!
//! Every invalidation bumps a generation counter. A summary is only stored if
//! the generation it was computed under is still current, so a summary that
//! raced with a publish is dropped instead of outliving it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crimelog_store::RecordFilter;
use crimelog_types::DatasetSummary;

#[derive(Debug)]
struct Entry {
    filter: RecordFilter,
    summary: DatasetSummary,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entry: Option<Entry>,
    generation: u64,
}

/// Single-entry summary cache keyed by filter.
///
/// Entries expire after the TTL and are dropped on every publish.
#[derive(Debug, Clone)]
pub struct SummaryCache {
    state: Arc<Mutex<CacheState>>,
    ttl: Duration,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            ttl,
        }
    }

    /// Cached summary for `filter`, if fresh.
    pub fn get(&self, filter: &RecordFilter) -> Option<DatasetSummary> {
        let state = self.lock();
        state
            .entry
            .as_ref()
            .filter(|e| e.filter == *filter && e.stored_at.elapsed() < self.ttl)
            .map(|e| e.summary.clone())
    }

    /// Current generation. Read it before computing a summary to [`put`](Self::put).
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Store `summary` if no invalidation happened since `generation` was read.
    ///
    /// Returns whether it was stored.
    pub fn put(&self, filter: RecordFilter, summary: DatasetSummary, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.entry = Some(Entry {
            filter,
            summary,
            stored_at: Instant::now(),
        });
        true
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.generation = state.generation.wrapping_add(1);
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
