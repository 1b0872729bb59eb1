//! Active elections container — all ongoing conflicts, keyed by qualified
//! root.
//!
//! Bounded to resist spam. Blocks whose predecessor is not yet confirmed are
//! parked and promoted automatically once the ancestor cements. A hash index
//! routes per-hash votes to the owning election.

use crate::election::{Election, ElectionStatus, VoteResult};
use crate::error::ConsensusError;
use std::collections::HashMap;
use strand_ledger::Block;
use strand_types::{Account, BlockHash, QualifiedRoot, Timestamp};

/// Outcome of offering a block to the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertResult {
    /// A new election was started.
    Started,
    /// The block joined an existing election as a fork candidate.
    Joined,
    /// An election for this root already tracks this block.
    Duplicate,
    /// Parked until the predecessor confirms.
    Deferred,
    /// Dropped: container or election at capacity.
    Dropped,
}

pub struct ActiveElections {
    elections: HashMap<QualifiedRoot, Election>,
    /// Routes candidate hashes to their election.
    by_hash: HashMap<BlockHash, QualifiedRoot>,
    /// Blocks waiting for their predecessor to confirm, keyed by it.
    deferred: HashMap<BlockHash, Vec<Block>>,
    deferred_count: usize,
    max_elections: usize,
    max_deferred: usize,
    /// Current quorum requirement, pushed in by the online-reps tracker.
    quorum_delta: u128,
}

impl ActiveElections {
    pub fn new(max_elections: usize, quorum_delta: u128) -> Self {
        Self {
            elections: HashMap::new(),
            by_hash: HashMap::new(),
            deferred: HashMap::new(),
            deferred_count: 0,
            max_elections,
            max_deferred: max_elections * 4,
            quorum_delta,
        }
    }

    /// Offer a block for election. `predecessor_confirmed` must be true when
    /// the block's previous is cemented (or the block is an open).
    pub fn insert(
        &mut self,
        block: Block,
        predecessor_confirmed: bool,
        local_origin: bool,
        now: Timestamp,
    ) -> InsertResult {
        let hash = block.hash();
        if self.by_hash.contains_key(&hash) {
            return InsertResult::Duplicate;
        }
        let root = QualifiedRoot::new(block.root(), block.previous());

        if let Some(election) = self.elections.get_mut(&root) {
            return if election.insert_candidate(block) {
                self.by_hash.insert(hash, root);
                InsertResult::Joined
            } else {
                InsertResult::Dropped
            };
        }

        if !predecessor_confirmed {
            if self.deferred_count >= self.max_deferred {
                return InsertResult::Dropped;
            }
            self.deferred.entry(block.previous()).or_default().push(block);
            self.deferred_count += 1;
            return InsertResult::Deferred;
        }

        if self.elections.len() >= self.max_elections {
            return InsertResult::Dropped;
        }
        let mut election = Election::new(root, block, self.quorum_delta, now);
        election.is_local_origin = local_origin;
        self.elections.insert(root, election);
        self.by_hash.insert(hash, root);
        InsertResult::Started
    }

    /// Release blocks that were waiting on `confirmed` and can now start
    /// their own elections.
    pub fn take_deferred(&mut self, confirmed: &BlockHash) -> Vec<Block> {
        match self.deferred.remove(confirmed) {
            Some(blocks) => {
                self.deferred_count -= blocks.len();
                blocks
            }
            None => Vec::new(),
        }
    }

    /// Route one `(hash, timestamp, weight)` observation from a validated
    /// vote. Returns the election status when this vote confirmed it.
    pub fn vote(
        &mut self,
        representative: &Account,
        timestamp: u64,
        hash: &BlockHash,
        weight: u128,
        now: Timestamp,
    ) -> Result<(VoteResult, Option<ElectionStatus>), ConsensusError> {
        let Some(root) = self.by_hash.get(hash) else {
            return Err(ConsensusError::ElectionNotFound(hash.to_string()));
        };
        let election = self
            .elections
            .get_mut(root)
            .expect("hash index entries always have an election");
        if election.is_confirmed() {
            return Err(ConsensusError::ElectionAlreadyConfirmed);
        }
        let result = election.vote(representative, timestamp, *hash, weight, now);
        let status = election.try_confirm(now);
        Ok((result, status))
    }

    pub fn election(&self, root: &QualifiedRoot) -> Option<&Election> {
        self.elections.get(root)
    }

    pub fn election_for_hash(&self, hash: &BlockHash) -> Option<&Election> {
        self.by_hash.get(hash).and_then(|root| self.elections.get(root))
    }

    /// Fork losers of a confirmed election, for rollback.
    pub fn confirmed_losers(&self, winner: &BlockHash) -> Vec<BlockHash> {
        self.election_for_hash(winner)
            .filter(|election| election.is_confirmed())
            .map(|election| election.losers(winner))
            .unwrap_or_default()
    }

    /// Remove an election and its hash-index entries. Administrative: the
    /// ledger keeps whatever was applied.
    pub fn erase(&mut self, root: &QualifiedRoot) -> Option<Election> {
        let election = self.elections.remove(root)?;
        for hash in election.candidate_hashes() {
            self.by_hash.remove(&hash);
        }
        Some(election)
    }

    /// Expire elections past their time budget; returns their roots.
    pub fn cleanup_expired(&mut self, timeout_secs: u64, now: Timestamp) -> Vec<QualifiedRoot> {
        let mut expired: Vec<QualifiedRoot> = Vec::new();
        for (root, election) in self.elections.iter_mut() {
            if election.check_timeout(timeout_secs, now) {
                expired.push(*root);
            }
        }
        for root in &expired {
            self.erase(root);
        }
        expired
    }

    /// Propagate a new quorum requirement to current and future elections.
    pub fn set_quorum_delta(&mut self, delta: u128) {
        self.quorum_delta = delta;
        for election in self.elections.values_mut() {
            election.set_quorum_delta(delta);
        }
    }

    pub fn quorum_delta(&self) -> u128 {
        self.quorum_delta
    }

    pub fn len(&self) -> usize {
        self.elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elections.is_empty()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred_count
    }

    /// Roots currently under election; used by the local vote generator.
    pub fn active_roots(&self) -> Vec<(QualifiedRoot, Option<BlockHash>)> {
        self.elections
            .iter()
            .map(|(root, election)| (*root, election.leading().map(|(hash, _)| hash)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_ledger::SendBlock;
    use strand_types::{Amount, Signature};

    fn block(previous: u8, destination: u8) -> Block {
        Block::Send(SendBlock {
            previous: BlockHash::new([previous; 32]),
            destination: Account::new([destination; 32]),
            balance: Amount::raw(0),
            signature: Signature::ZERO,
            work: 0,
        })
    }

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn insert_starts_election() {
        let mut active = ActiveElections::new(8, 1000);
        let result = active.insert(block(1, 1), true, false, ts(100));
        assert_eq!(result, InsertResult::Started);
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn duplicate_block_detected() {
        let mut active = ActiveElections::new(8, 1000);
        active.insert(block(1, 1), true, false, ts(100));
        assert_eq!(
            active.insert(block(1, 1), true, false, ts(101)),
            InsertResult::Duplicate
        );
    }

    #[test]
    fn fork_joins_existing_election() {
        let mut active = ActiveElections::new(8, 1000);
        active.insert(block(1, 1), true, false, ts(100));
        assert_eq!(
            active.insert(block(1, 2), true, false, ts(101)),
            InsertResult::Joined
        );
        assert_eq!(active.len(), 1);
        let election = active.election_for_hash(&block(1, 2).hash()).unwrap();
        assert_eq!(election.candidate_hashes().len(), 2);
    }

    #[test]
    fn unconfirmed_predecessor_defers() {
        let mut active = ActiveElections::new(8, 1000);
        assert_eq!(
            active.insert(block(1, 1), false, false, ts(100)),
            InsertResult::Deferred
        );
        assert_eq!(active.len(), 0);
        assert_eq!(active.deferred_len(), 1);

        let released = active.take_deferred(&BlockHash::new([1; 32]));
        assert_eq!(released.len(), 1);
        assert_eq!(active.deferred_len(), 0);
    }

    #[test]
    fn capacity_drops_new_roots() {
        let mut active = ActiveElections::new(2, 1000);
        active.insert(block(1, 1), true, false, ts(100));
        active.insert(block(2, 1), true, false, ts(100));
        assert_eq!(
            active.insert(block(3, 1), true, false, ts(100)),
            InsertResult::Dropped
        );
    }

    #[test]
    fn vote_routes_by_hash_and_confirms() {
        let mut active = ActiveElections::new(8, 700);
        let candidate = block(1, 1);
        let hash = candidate.hash();
        active.insert(candidate, true, false, ts(100));

        let (result, status) = active.vote(&rep(1), 1, &hash, 400, ts(101)).unwrap();
        assert_eq!(result, VoteResult::Accepted);
        assert!(status.is_none());

        let (_, status) = active.vote(&rep(2), 1, &hash, 300, ts(102)).unwrap();
        let status = status.expect("confirmed");
        assert_eq!(status.winner.hash(), hash);
        assert_eq!(status.tally, 700);
    }

    #[test]
    fn vote_for_unknown_hash_errors() {
        let mut active = ActiveElections::new(8, 1000);
        let result = active.vote(&rep(1), 1, &BlockHash::new([9; 32]), 100, ts(100));
        assert!(matches!(result, Err(ConsensusError::ElectionNotFound(_))));
    }

    #[test]
    fn vote_on_confirmed_election_errors() {
        let mut active = ActiveElections::new(8, 100);
        let candidate = block(1, 1);
        let hash = candidate.hash();
        active.insert(candidate, true, false, ts(100));
        active.vote(&rep(1), 1, &hash, 100, ts(101)).unwrap();
        assert!(matches!(
            active.vote(&rep(2), 1, &hash, 100, ts(102)),
            Err(ConsensusError::ElectionAlreadyConfirmed)
        ));
    }

    #[test]
    fn confirmed_losers_listed_for_rollback() {
        let mut active = ActiveElections::new(8, 500);
        let winner = block(1, 1);
        let loser = block(1, 2);
        let winner_hash = winner.hash();
        let loser_hash = loser.hash();
        active.insert(winner, true, false, ts(100));
        active.insert(loser, true, false, ts(100));

        active.vote(&rep(1), 1, &loser_hash, 100, ts(101)).unwrap();
        active.vote(&rep(2), 1, &winner_hash, 600, ts(102)).unwrap();

        assert_eq!(active.confirmed_losers(&winner_hash), vec![loser_hash]);
    }

    #[test]
    fn cleanup_expired_frees_capacity() {
        let mut active = ActiveElections::new(2, u128::MAX);
        active.insert(block(1, 1), true, false, ts(100));
        active.insert(block(2, 1), true, false, ts(100));

        let expired = active.cleanup_expired(60, ts(200));
        assert_eq!(expired.len(), 2);
        assert!(active.is_empty());
        assert_eq!(
            active.insert(block(3, 1), true, false, ts(201)),
            InsertResult::Started
        );
    }

    #[test]
    fn quorum_delta_updates_running_elections() {
        let mut active = ActiveElections::new(8, u128::MAX);
        let candidate = block(1, 1);
        let hash = candidate.hash();
        active.insert(candidate, true, false, ts(100));

        // Unreachable quorum, then the online stake collapses and the delta
        // falls below the observed vote weight.
        let (_, status) = active.vote(&rep(1), 1, &hash, 400, ts(101)).unwrap();
        assert!(status.is_none());
        active.set_quorum_delta(300);
        let (_, status) = active.vote(&rep(2), 1, &hash, 1, ts(102)).unwrap();
        assert!(status.is_some());
    }
}
