//! Election state machine — one conflict, a handful of candidates, a tally.
//!
//! An election is keyed by qualified root. Representatives vote by hash;
//! replay protection is per representative: a vote whose timestamp is not
//! strictly newer than the last observed one is dropped. A final vote pins
//! the representative's choice permanently.

use crate::vote::FINAL_TIMESTAMP;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strand_ledger::Block;
use strand_types::{Account, BlockHash, QualifiedRoot, Timestamp};

/// Candidates per election; forks beyond this are dropped on arrival.
const MAX_CANDIDATES: usize = 10;

/// The lifecycle state of an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionState {
    /// Created, waiting for votes to arrive.
    Passive,
    /// Votes observed, actively soliciting more.
    Active,
    /// Reached quorum. Terminal.
    Confirmed,
    /// Timed out without quorum. Terminal.
    Expired,
}

/// Latest vote observed from one representative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteInfo {
    pub timestamp: u64,
    pub hash: BlockHash,
    pub weight: u128,
    pub received: Timestamp,
}

/// Outcome of feeding one vote into an election.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteResult {
    /// First vote from this representative.
    Accepted,
    /// Replaced the representative's earlier vote.
    Updated,
    /// Not strictly newer than the last observed timestamp.
    Replay,
    /// Election is terminal or the candidate is unknown.
    Ignored,
}

/// Summary of a confirmed election.
#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub winner: Block,
    pub tally: u128,
    pub final_tally: u128,
    pub duration_secs: u64,
    pub voter_count: usize,
}

/// A single conflict being resolved.
#[derive(Clone, Debug)]
pub struct Election {
    pub root: QualifiedRoot,
    pub state: ElectionState,
    /// Candidate blocks by hash, capped at `MAX_CANDIDATES`.
    candidates: HashMap<BlockHash, Block>,
    /// Latest vote per representative.
    last_votes: HashMap<Account, VoteInfo>,
    /// Running weight per candidate.
    tally: HashMap<BlockHash, u128>,
    /// Running *final* weight per candidate.
    final_tally: HashMap<BlockHash, u128>,
    /// Weight required to confirm.
    quorum_delta: u128,
    pub created_at: Timestamp,
    pub state_changed_at: Timestamp,
    /// Set when the block at this root came from the local wallet; such
    /// elections are flooded to principal representatives.
    pub is_local_origin: bool,
}

impl Election {
    pub fn new(root: QualifiedRoot, first: Block, quorum_delta: u128, now: Timestamp) -> Self {
        let mut candidates = HashMap::new();
        candidates.insert(first.hash(), first);
        Self {
            root,
            state: ElectionState::Passive,
            candidates,
            last_votes: HashMap::new(),
            tally: HashMap::new(),
            final_tally: HashMap::new(),
            quorum_delta,
            created_at: now,
            state_changed_at: now,
            is_local_origin: false,
        }
    }

    /// Register another candidate (a fork sibling). Returns `false` when the
    /// candidate cap is reached or the election is terminal.
    pub fn insert_candidate(&mut self, block: Block) -> bool {
        if self.is_terminal() {
            return false;
        }
        let hash = block.hash();
        if self.candidates.contains_key(&hash) {
            return true;
        }
        if self.candidates.len() >= MAX_CANDIDATES {
            return false;
        }
        self.candidates.insert(hash, block);
        true
    }

    pub fn candidate(&self, hash: &BlockHash) -> Option<&Block> {
        self.candidates.get(hash)
    }

    pub fn candidate_hashes(&self) -> Vec<BlockHash> {
        self.candidates.keys().copied().collect()
    }

    /// Feed one representative's vote for one candidate hash.
    pub fn vote(
        &mut self,
        representative: &Account,
        timestamp: u64,
        hash: BlockHash,
        weight: u128,
        now: Timestamp,
    ) -> VoteResult {
        if self.is_terminal() {
            return VoteResult::Ignored;
        }
        if !self.candidates.contains_key(&hash) {
            return VoteResult::Ignored;
        }

        let result = match self.last_votes.get(representative) {
            Some(existing) => {
                // Monotonic per-rep timestamps; finals never move.
                if existing.timestamp == FINAL_TIMESTAMP || timestamp <= existing.timestamp {
                    return VoteResult::Replay;
                }
                let old = existing.clone();
                if let Some(w) = self.tally.get_mut(&old.hash) {
                    *w = w.saturating_sub(old.weight);
                    if *w == 0 {
                        self.tally.remove(&old.hash);
                    }
                }
                VoteResult::Updated
            }
            None => VoteResult::Accepted,
        };

        self.last_votes.insert(
            *representative,
            VoteInfo {
                timestamp,
                hash,
                weight,
                received: now,
            },
        );
        *self.tally.entry(hash).or_insert(0) += weight;
        if timestamp == FINAL_TIMESTAMP {
            *self.final_tally.entry(hash).or_insert(0) += weight;
        }
        if self.state == ElectionState::Passive {
            self.state = ElectionState::Active;
            self.state_changed_at = now;
        }
        result
    }

    /// Confirm if the leading candidate clears the quorum delta.
    pub fn try_confirm(&mut self, now: Timestamp) -> Option<ElectionStatus> {
        if self.is_terminal() {
            return None;
        }
        let (winner_hash, tally) = self.leading()?;
        if tally < self.quorum_delta {
            return None;
        }
        self.state = ElectionState::Confirmed;
        self.state_changed_at = now;
        let winner = self
            .candidates
            .get(&winner_hash)
            .expect("tally entries only exist for candidates")
            .clone();
        Some(ElectionStatus {
            winner,
            tally,
            final_tally: self.final_tally.get(&winner_hash).copied().unwrap_or(0),
            duration_secs: self.created_at.elapsed_since(now),
            voter_count: self.last_votes.len(),
        })
    }

    /// Expire the election if its age exceeds `timeout_secs`.
    pub fn check_timeout(&mut self, timeout_secs: u64, now: Timestamp) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self.created_at.has_expired(timeout_secs, now) {
            self.state = ElectionState::Expired;
            self.state_changed_at = now;
            true
        } else {
            false
        }
    }

    pub fn leading(&self) -> Option<(BlockHash, u128)> {
        self.tally
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(hash, weight)| (*hash, *weight))
    }

    /// Candidate hashes other than the winner, for rollback after
    /// confirmation.
    pub fn losers(&self, winner: &BlockHash) -> Vec<BlockHash> {
        self.candidates
            .keys()
            .filter(|hash| *hash != winner)
            .copied()
            .collect()
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == ElectionState::Confirmed
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ElectionState::Confirmed | ElectionState::Expired)
    }

    pub fn quorum_delta(&self) -> u128 {
        self.quorum_delta
    }

    pub fn set_quorum_delta(&mut self, delta: u128) {
        self.quorum_delta = delta;
    }

    pub fn voter_count(&self) -> usize {
        self.last_votes.len()
    }

    pub fn tally_of(&self, hash: &BlockHash) -> u128 {
        self.tally.get(hash).copied().unwrap_or(0)
    }
}
