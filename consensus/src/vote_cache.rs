//! Vote cache — holds votes that arrive before their election exists.
//!
//! Representatives broadcast as soon as they see a block; the local node may
//! not have started (or even heard of) the election yet. Cached votes seed
//! the election when it starts. Per-voter dedup keeps only the newest
//! timestamp; a per-hash voter cap evicts the lightest voter first.

use std::collections::HashMap;
use strand_types::{Account, BlockHash, Timestamp};

const MAX_CACHED_HASHES: usize = 65_536;
const MAX_VOTERS_PER_HASH: usize = 64;
const CACHE_TTL_SECS: u64 = 900;

#[derive(Clone, Debug)]
pub struct CachedVote {
    pub voter: Account,
    pub timestamp: u64,
    pub weight: u128,
    pub arrived: Timestamp,
}

#[derive(Default)]
struct CacheEntry {
    votes: Vec<CachedVote>,
    tally: u128,
}

#[derive(Default)]
pub struct VoteCache {
    entries: HashMap<BlockHash, CacheEntry>,
}

impl VoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache one observed `(voter, timestamp, weight)` for a hash.
    pub fn insert(
        &mut self,
        hash: BlockHash,
        voter: Account,
        timestamp: u64,
        weight: u128,
        now: Timestamp,
    ) {
        if self.entries.len() >= MAX_CACHED_HASHES {
            self.cleanup(now);
        }
        let entry = self.entries.entry(hash).or_default();

        if let Some(existing) = entry.votes.iter_mut().find(|v| v.voter == voter) {
            if timestamp > existing.timestamp {
                entry.tally = entry.tally.saturating_sub(existing.weight) + weight;
                existing.timestamp = timestamp;
                existing.weight = weight;
                existing.arrived = now;
            }
            return;
        }

        if entry.votes.len() >= MAX_VOTERS_PER_HASH {
            let lightest = entry
                .votes
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.weight)
                .map(|(i, _)| i)
                .expect("cap implies non-empty");
            if weight <= entry.votes[lightest].weight {
                return;
            }
            let removed = entry.votes.remove(lightest);
            entry.tally = entry.tally.saturating_sub(removed.weight);
        }

        entry.tally += weight;
        entry.votes.push(CachedVote {
            voter,
            timestamp,
            weight,
            arrived: now,
        });
    }

    /// Remove and return all cached votes for a hash (election start).
    pub fn drain(&mut self, hash: &BlockHash) -> Vec<CachedVote> {
        self.entries
            .remove(hash)
            .map(|entry| entry.votes)
            .unwrap_or_default()
    }

    pub fn tally(&self, hash: &BlockHash) -> u128 {
        self.entries.get(hash).map(|entry| entry.tally).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose newest vote is older than the TTL.
    pub fn cleanup(&mut self, now: Timestamp) {
        self.entries.retain(|_, entry| {
            entry
                .votes
                .iter()
                .any(|v| v.arrived.elapsed_since(now) < CACHE_TTL_SECS)
        });
    }
}
