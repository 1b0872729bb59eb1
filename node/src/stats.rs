//! Drop/error accounting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter names used across the pipeline.
pub mod counter {
    pub const BLOCKS_PROCESSED: &str = "blocks_processed";
    pub const BLOCKS_PROGRESS: &str = "blocks_progress";
    pub const BLOCKS_OLD: &str = "blocks_old";
    pub const BLOCKS_FORK: &str = "blocks_fork";
    pub const BLOCKS_GAP: &str = "blocks_gap";
    pub const BLOCKS_BAD_SIGNATURE: &str = "blocks_bad_signature";
    pub const BLOCKS_INSUFFICIENT_WORK: &str = "blocks_insufficient_work";
    pub const BLOCKS_OTHER_DROP: &str = "blocks_other_drop";
    pub const BLOCKS_ROLLED_BACK: &str = "blocks_rolled_back";
    pub const QUEUE_OVERFLOW: &str = "queue_overflow";
    pub const UNCHECKED_EVICTED: &str = "unchecked_evicted";
    pub const VOTES_PROCESSED: &str = "votes_processed";
    pub const VOTES_REPLAY: &str = "votes_replay";
    pub const VOTES_INDETERMINATE: &str = "votes_indeterminate";
    pub const VOTES_BAD_SIGNATURE: &str = "votes_bad_signature";
    pub const VOTES_CACHED: &str = "votes_cached";
    pub const ELECTIONS_STARTED: &str = "elections_started";
    pub const ELECTIONS_CONFIRMED: &str = "elections_confirmed";
    pub const ELECTIONS_EXPIRED: &str = "elections_expired";
    pub const BLOCKS_CEMENTED: &str = "blocks_cemented";
}

/// A thread-safe counter collection for pipeline statistics.
pub struct StatsCounter {
    counters: HashMap<&'static str, AtomicU64>,
}

impl StatsCounter {
    pub fn new() -> Self {
        let names = [
            counter::BLOCKS_PROCESSED,
            counter::BLOCKS_PROGRESS,
            counter::BLOCKS_OLD,
            counter::BLOCKS_FORK,
            counter::BLOCKS_GAP,
            counter::BLOCKS_BAD_SIGNATURE,
            counter::BLOCKS_INSUFFICIENT_WORK,
            counter::BLOCKS_OTHER_DROP,
            counter::BLOCKS_ROLLED_BACK,
            counter::QUEUE_OVERFLOW,
            counter::UNCHECKED_EVICTED,
            counter::VOTES_PROCESSED,
            counter::VOTES_REPLAY,
            counter::VOTES_INDETERMINATE,
            counter::VOTES_BAD_SIGNATURE,
            counter::VOTES_CACHED,
            counter::ELECTIONS_STARTED,
            counter::ELECTIONS_CONFIRMED,
            counter::ELECTIONS_EXPIRED,
            counter::BLOCKS_CEMENTED,
        ];
        let mut counters = HashMap::new();
        for name in names {
            counters.insert(name, AtomicU64::new(0));
        }
        Self { counters }
    }

    pub fn increment(&self, name: &str) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        self.counters
            .iter()
            .map(|(&name, counter)| (name, counter.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_and_read() {
        let stats = StatsCounter::new();
        stats.increment(counter::BLOCKS_PROGRESS);
        stats.add(counter::BLOCKS_PROGRESS, 2);
        assert_eq!(stats.get(counter::BLOCKS_PROGRESS), 3);
        assert_eq!(stats.get(counter::BLOCKS_FORK), 0);
    }

    #[test]
    fn unknown_counter_is_ignored() {
        let stats = StatsCounter::new();
        stats.increment("nonsense");
        assert_eq!(stats.get("nonsense"), 0);
    }
}
