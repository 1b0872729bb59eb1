//! Local vote generation and the emitted-vote history.
//!
//! When the node holds a representative key it answers `confirm_req`s and
//! election activity with its own votes. Hashes are batched up to the vote
//! cap to amortize signatures, spaced per root so the rep cannot be walked
//! into rapid flip-flops, and every emitted vote is cached so a repeated
//! request replays the signature instead of regenerating it.

use crate::vote::{Vote, FINAL_TIMESTAMP, MAX_VOTE_HASHES};
use std::collections::HashMap;
use std::sync::Arc;
use strand_types::{BlockHash, KeyPair, Root, Timestamp};

/// Minimum delay before this rep will vote for a *different* hash at the
/// same root.
const VOTE_SPACING_SECS: u64 = 4;

/// Cached votes retained per root.
const MAX_HISTORY_PER_ROOT: usize = 4;

/// Tracks the last hash voted for per root, enforcing the spacing delay
/// before a switch.
#[derive(Default)]
pub struct VoteSpacing {
    recent: HashMap<Root, (BlockHash, Timestamp)>,
}

impl VoteSpacing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether voting for `hash` at `root` is allowed right now.
    pub fn votable(&self, root: &Root, hash: &BlockHash, now: Timestamp) -> bool {
        match self.recent.get(root) {
            Some((last_hash, last_time)) => {
                *last_hash == *hash || last_time.has_expired(VOTE_SPACING_SECS, now)
            }
            None => true,
        }
    }

    pub fn flag(&mut self, root: Root, hash: BlockHash, now: Timestamp) {
        self.recent.insert(root, (hash, now));
    }

    pub fn prune(&mut self, now: Timestamp) {
        self.recent
            .retain(|_, (_, time)| !time.has_expired(VOTE_SPACING_SECS * 16, now));
    }
}

/// The last votes this node emitted, keyed by root.
#[derive(Default)]
pub struct LocalVoteHistory {
    votes: HashMap<Root, Vec<(BlockHash, Arc<Vote>)>>,
}

impl LocalVoteHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, root: Root, hash: BlockHash, vote: Arc<Vote>) {
        let entry = self.votes.entry(root).or_default();
        entry.retain(|(h, _)| *h != hash);
        entry.push((hash, vote));
        if entry.len() > MAX_HISTORY_PER_ROOT {
            entry.remove(0);
        }
    }

    /// Cached votes for `(root, hash)`; an empty result means the caller
    /// should generate a fresh vote.
    pub fn votes(&self, root: &Root, hash: &BlockHash) -> Vec<Arc<Vote>> {
        self.votes
            .get(root)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|(h, _)| *h == *hash)
                    .map(|(_, vote)| Arc::clone(vote))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn erase(&mut self, root: &Root) {
        self.votes.remove(root);
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

/// Generates this node's votes from its representative key.
pub struct VoteGenerator {
    key: KeyPair,
    history: LocalVoteHistory,
    spacing: VoteSpacing,
    /// Last non-final timestamp used, to keep the per-rep sequence strictly
    /// increasing even within one second.
    last_timestamp: u64,
}

impl VoteGenerator {
    pub fn new(key: KeyPair) -> Self {
        Self {
            key,
            history: LocalVoteHistory::new(),
            spacing: VoteSpacing::new(),
            last_timestamp: 0,
        }
    }

    pub fn history(&self) -> &LocalVoteHistory {
        &self.history
    }

    /// Vote over a batch of `(root, hash)` targets. Targets blocked by
    /// spacing are skipped; the rest are chunked into signed votes.
    pub fn generate(
        &mut self,
        targets: &[(Root, BlockHash)],
        is_final: bool,
        now: Timestamp,
    ) -> Vec<Arc<Vote>> {
        let votable: Vec<&(Root, BlockHash)> = targets
            .iter()
            .filter(|(root, hash)| self.spacing.votable(root, hash, now))
            .collect();
        if votable.is_empty() {
            return Vec::new();
        }

        let timestamp = if is_final {
            FINAL_TIMESTAMP
        } else {
            self.last_timestamp = self.last_timestamp.max(now.as_secs()).saturating_add(1);
            self.last_timestamp
        };

        let mut votes = Vec::new();
        for chunk in votable.chunks(MAX_VOTE_HASHES) {
            let hashes: Vec<BlockHash> = chunk.iter().map(|(_, hash)| *hash).collect();
            let vote = Arc::new(Vote::new(&self.key, timestamp, hashes));
            for (root, hash) in chunk {
                self.spacing.flag(*root, *hash, now);
                self.history.add(*root, *hash, Arc::clone(&vote));
            }
            votes.push(vote);
        }
        votes
    }

    /// Answer a `confirm_req`: replay cached votes where available,
    /// generate for the rest.
    pub fn votes_for(
        &mut self,
        targets: &[(Root, BlockHash)],
        now: Timestamp,
    ) -> Vec<Arc<Vote>> {
        let mut cached = Vec::new();
        let mut missing = Vec::new();
        for (root, hash) in targets {
            let replayed = self.history.votes(root, hash);
            if replayed.is_empty() {
                missing.push((*root, *hash));
            } else {
                cached.extend(replayed);
            }
        }
        cached.extend(self.generate(&missing, false, now));
        cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_crypto::keypair_from_seed;

    fn root(byte: u8) -> Root {
        Root::new([byte; 32])
    }

    fn hash(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn spacing_allows_same_hash_blocks_switch() {
        let mut spacing = VoteSpacing::new();
        spacing.flag(root(1), hash(1), ts(100));
        assert!(spacing.votable(&root(1), &hash(1), ts(101)));
        assert!(!spacing.votable(&root(1), &hash(2), ts(101)));
        // After the delay the switch is allowed.
        assert!(spacing.votable(&root(1), &hash(2), ts(100 + VOTE_SPACING_SECS)));
    }

    #[test]
    fn generate_batches_and_records_history() {
        let mut generator = VoteGenerator::new(keypair_from_seed(&[1u8; 32]));
        let targets: Vec<(Root, BlockHash)> =
            (0..20u8).map(|i| (root(i), hash(i))).collect();
        let votes = generator.generate(&targets, false, ts(100));
        // 20 targets, 12-hash cap: two votes.
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].hashes.len(), MAX_VOTE_HASHES);
        assert_eq!(votes[1].hashes.len(), 8);
        for vote in &votes {
            assert!(vote.validate().is_ok());
        }
        assert_eq!(generator.history().votes(&root(3), &hash(3)).len(), 1);
    }

    #[test]
    fn generated_timestamps_strictly_increase() {
        let mut generator = VoteGenerator::new(keypair_from_seed(&[1u8; 32]));
        let v1 = generator.generate(&[(root(1), hash(1))], false, ts(100));
        let v2 = generator.generate(&[(root(2), hash(2))], false, ts(100));
        assert!(v2[0].timestamp > v1[0].timestamp);
    }

    #[test]
    fn final_votes_use_reserved_timestamp() {
        let mut generator = VoteGenerator::new(keypair_from_seed(&[1u8; 32]));
        let votes = generator.generate(&[(root(1), hash(1))], true, ts(100));
        assert!(votes[0].is_final());
    }

    #[test]
    fn confirm_req_replays_cached_signature() {
        let mut generator = VoteGenerator::new(keypair_from_seed(&[1u8; 32]));
        let targets = [(root(1), hash(1))];
        let first = generator.votes_for(&targets, ts(100));
        let second = generator.votes_for(&targets, ts(101));
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        // Same Arc, same signature: no regeneration.
        assert_eq!(first[0].signature, second[0].signature);
        assert_eq!(first[0].timestamp, second[0].timestamp);
    }

    #[test]
    fn spacing_suppresses_flip_flop_votes() {
        let mut generator = VoteGenerator::new(keypair_from_seed(&[1u8; 32]));
        generator.generate(&[(root(1), hash(1))], false, ts(100));
        // A competing hash at the same root within the spacing window.
        let votes = generator.generate(&[(root(1), hash(2))], false, ts(101));
        assert!(votes.is_empty());
    }

    #[test]
    fn history_caps_entries_per_root() {
        let mut history = LocalVoteHistory::new();
        let key = keypair_from_seed(&[1u8; 32]);
        for i in 0..10u8 {
            let vote = Arc::new(Vote::new(&key, i as u64 + 1, vec![hash(i)]));
            history.add(root(1), hash(i), vote);
        }
        let total: usize = (0..10u8)
            .map(|i| history.votes(&root(1), &hash(i)).len())
            .sum();
        assert_eq!(total, MAX_HISTORY_PER_ROOT);
    }
}
