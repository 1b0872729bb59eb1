//! Vote processor — validates incoming votes and dispatches them.
//!
//! Errors are counted and logged, never propagated: a bad vote must not
//! abort the batch it arrived in. Votes with no matching election are cached
//! briefly so a later-started election can seed from them.

use crate::event_bus::{EventBus, NodeEvent};
use crate::stats::{counter, StatsCounter};
use std::sync::Arc;
use strand_consensus::{
    ActiveElections, ConsensusError, ElectionStatus, OnlineReps, Vote, VoteCache, VoteError,
};
use strand_ledger::Ledger;
use strand_types::Timestamp;

/// Result of dispatching one vote.
#[derive(Debug, Default)]
pub struct VoteDispatch {
    /// Hashes applied to an active election.
    pub applied: usize,
    /// Hashes with no election, parked in the vote cache.
    pub cached: usize,
    /// Elections this vote pushed over quorum.
    pub confirmed: Vec<ElectionStatus>,
}

pub struct VoteProcessor {
    ledger: Arc<Ledger>,
    stats: Arc<StatsCounter>,
    events: Arc<EventBus>,
}

impl VoteProcessor {
    pub fn new(ledger: Arc<Ledger>, stats: Arc<StatsCounter>, events: Arc<EventBus>) -> Self {
        Self {
            ledger,
            stats,
            events,
        }
    }

    /// Validate and dispatch one vote.
    pub fn process(
        &self,
        vote: &Vote,
        active: &mut ActiveElections,
        cache: &mut VoteCache,
        online: &mut OnlineReps,
        now: Timestamp,
    ) -> Result<VoteDispatch, VoteError> {
        vote.validate().inspect_err(|error| {
            let name = match error {
                VoteError::BadSignature => counter::VOTES_BAD_SIGNATURE,
                VoteError::Indeterminate => counter::VOTES_INDETERMINATE,
                VoteError::Replay => counter::VOTES_REPLAY,
            };
            self.stats.increment(name);
        })?;

        let representative = vote.voting_account;
        let weight = self.ledger.weight(&representative);
        if weight.is_zero() {
            self.stats.increment(counter::VOTES_INDETERMINATE);
            return Err(VoteError::Indeterminate);
        }

        online.observe(representative, now);
        self.stats.increment(counter::VOTES_PROCESSED);
        self.events.emit(&NodeEvent::VoteSeen {
            representative,
            hashes: vote.hashes.clone(),
            is_final: vote.is_final(),
        });

        let mut dispatch = VoteDispatch::default();
        let mut replays = 0usize;
        for hash in &vote.hashes {
            match active.vote(&representative, vote.timestamp, hash, weight.value(), now) {
                Ok((result, status)) => {
                    if result == strand_consensus::VoteResult::Replay {
                        replays += 1;
                    } else {
                        dispatch.applied += 1;
                    }
                    if let Some(status) = status {
                        self.stats.increment(counter::ELECTIONS_CONFIRMED);
                        dispatch.confirmed.push(status);
                    }
                }
                Err(ConsensusError::ElectionNotFound(_)) => {
                    cache.insert(*hash, representative, vote.timestamp, weight.value(), now);
                    self.stats.increment(counter::VOTES_CACHED);
                    dispatch.cached += 1;
                }
                Err(ConsensusError::ElectionAlreadyConfirmed) => {}
                Err(error) => {
                    tracing::debug!(%representative, %error, "vote dispatch failed");
                }
            }
        }

        if replays > 0 && dispatch.applied == 0 && dispatch.cached == 0 {
            self.stats.increment(counter::VOTES_REPLAY);
            return Err(VoteError::Replay);
        }
        Ok(dispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strand_consensus::OnlineRepsConfig;
    use strand_crypto::keypair_from_seed;
    use strand_ledger::{dev_genesis_key, LedgerConstants};
    use strand_store::{Store, StoreOptions};
    use strand_types::BlockHash;
    use tempfile::TempDir;

    fn ledger() -> (TempDir, Arc<Ledger>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open_with(dir.path(), StoreOptions::dev()).unwrap());
        let ledger = Arc::new(Ledger::new(store, LedgerConstants::dev()).unwrap());
        (dir, ledger)
    }

    fn processor(ledger: Arc<Ledger>) -> VoteProcessor {
        VoteProcessor::new(
            ledger,
            Arc::new(StatsCounter::new()),
            Arc::new(EventBus::new()),
        )
    }

    #[test]
    fn zero_weight_rep_is_indeterminate() {
        let (_dir, ledger) = ledger();
        let processor = processor(Arc::clone(&ledger));
        let nobody = keypair_from_seed(&[9u8; 32]);
        let vote = Vote::new(&nobody, 1, vec![BlockHash::new([1u8; 32])]);

        let mut active = ActiveElections::new(8, 1000);
        let mut cache = VoteCache::new();
        let mut online = OnlineReps::new(OnlineRepsConfig::default());
        let result = processor.process(
            &vote,
            &mut active,
            &mut cache,
            &mut online,
            Timestamp::new(100),
        );
        assert_eq!(result.unwrap_err(), VoteError::Indeterminate);
    }

    #[test]
    fn unclaimed_vote_lands_in_cache() {
        let (_dir, ledger) = ledger();
        let processor = processor(Arc::clone(&ledger));
        // The dev genesis key holds the entire supply: plenty of weight.
        let vote = Vote::new(&dev_genesis_key(), 1, vec![BlockHash::new([1u8; 32])]);

        let mut active = ActiveElections::new(8, 1000);
        let mut cache = VoteCache::new();
        let mut online = OnlineReps::new(OnlineRepsConfig::default());
        let dispatch = processor
            .process(
                &vote,
                &mut active,
                &mut cache,
                &mut online,
                Timestamp::new(100),
            )
            .unwrap();
        assert_eq!(dispatch.cached, 1);
        assert_eq!(dispatch.applied, 0);
        assert!(cache.tally(&BlockHash::new([1u8; 32])) > 0);
        // The rep now counts as online.
        assert_eq!(online.online_reps(Timestamp::new(100)).len(), 1);
    }

    #[test]
    fn tampered_vote_is_rejected() {
        let (_dir, ledger) = ledger();
        let processor = processor(Arc::clone(&ledger));
        let mut vote = Vote::new(&dev_genesis_key(), 1, vec![BlockHash::new([1u8; 32])]);
        vote.timestamp = 2;

        let mut active = ActiveElections::new(8, 1000);
        let mut cache = VoteCache::new();
        let mut online = OnlineReps::new(OnlineRepsConfig::default());
        let result = processor.process(
            &vote,
            &mut active,
            &mut cache,
            &mut online,
            Timestamp::new(100),
        );
        assert_eq!(result.unwrap_err(), VoteError::BadSignature);
    }
}
