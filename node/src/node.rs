//! Node wiring — one struct owning every component, built leaves-first.
//!
//! The store opens first, the ledger over it, then the processors, then the
//! election layer; references flow one way. Cross-component reactions (an
//! election winner forcing a rollback, a cemented block releasing parked
//! dependents) run through the owning `Node` methods rather than back-calls.

use crate::block_processor::{BlockProcessor, BlockSource, ProcessedItem};
use crate::cementer::Cementer;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::event_bus::EventBus;
use crate::recently_cemented::RecentlyCemented;
use crate::stats::{counter, StatsCounter};
use crate::vote_processor::{VoteDispatch, VoteProcessor};
use crate::write_queue::{WriteQueue, Writer};
use std::path::Path;
use std::sync::{Arc, Mutex};
use strand_consensus::{
    ActiveElections, ElectionStatus, InsertResult, OnlineReps, Vote, VoteCache, VoteError,
    VoteGenerator,
};
use strand_ledger::{Block, BlockStatus, Ledger, LedgerConstants};
use strand_store::{Store, StoreOptions};
use strand_types::{Account, Amount, BlockHash, KeyPair, QualifiedRoot, Root, Timestamp};

/// What one pipeline tick produced, for the network layer to act on.
#[derive(Default)]
pub struct TickResult {
    /// Items classified this tick.
    pub processed: Vec<ProcessedItem>,
    /// Freshly applied blocks to gossip onward.
    pub republish: Vec<Block>,
    /// Applied winners to send back at peers that offered a fork loser.
    pub rebroadcast_winners: Vec<Block>,
    /// Hashes cemented this tick, commit order.
    pub cemented: Vec<BlockHash>,
}

pub struct Node {
    pub config: NodeConfig,
    pub store: Arc<Store>,
    pub ledger: Arc<Ledger>,
    pub stats: Arc<StatsCounter>,
    pub events: Arc<EventBus>,
    pub write_queue: Arc<WriteQueue>,
    pub block_processor: BlockProcessor,
    pub cementer: Cementer,
    pub vote_processor: VoteProcessor,
    pub active: Mutex<ActiveElections>,
    pub vote_cache: Mutex<VoteCache>,
    pub online_reps: Mutex<OnlineReps>,
    pub recently_cemented: Mutex<RecentlyCemented>,
    vote_generator: Option<Mutex<VoteGenerator>>,
}

impl Node {
    /// Open the store at `path` and assemble the node. `events` carries any
    /// observers the caller subscribed beforehand; `rep_key` enables local
    /// vote generation.
    pub fn open(
        path: &Path,
        constants: LedgerConstants,
        config: NodeConfig,
        events: EventBus,
        rep_key: Option<KeyPair>,
    ) -> Result<Self, NodeError> {
        let store = Arc::new(Store::open_with(path, StoreOptions::default())?);
        Self::with_store(store, constants, config, events, rep_key)
    }

    pub fn with_store(
        store: Arc<Store>,
        constants: LedgerConstants,
        config: NodeConfig,
        events: EventBus,
        rep_key: Option<KeyPair>,
    ) -> Result<Self, NodeError> {
        let ledger = Arc::new(Ledger::new(Arc::clone(&store), constants)?);
        if config.pruning_enabled {
            ledger.enable_pruning();
        }
        let stats = Arc::new(StatsCounter::new());
        let events = Arc::new(events);
        let write_queue = Arc::new(WriteQueue::new());

        let block_processor = BlockProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&write_queue),
            Arc::clone(&stats),
            Arc::clone(&events),
            config.block_queue_max,
            config.batch_size,
            config.unchecked_max,
        );
        block_processor.restore_unchecked()?;

        let cementer = Cementer::new(
            Arc::clone(&ledger),
            Arc::clone(&write_queue),
            Arc::clone(&stats),
            Arc::clone(&events),
            config.cementer_queue_max,
            config.cementer_batch_size,
        );
        let vote_processor = VoteProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&stats),
            Arc::clone(&events),
        );

        let mut online = OnlineReps::new(config.online_reps());
        {
            let txn = store.tx_begin_read()?;
            online.seed_samples(
                store
                    .online_weight
                    .iter_all(&txn)?
                    .into_iter()
                    .map(|(_, weight)| weight),
            );
        }
        let active = ActiveElections::new(config.active_elections_max, online.quorum_delta());

        Ok(Self {
            recently_cemented: Mutex::new(RecentlyCemented::new(config.recently_cemented_max)),
            vote_generator: rep_key.map(|key| Mutex::new(VoteGenerator::new(key))),
            active: Mutex::new(active),
            vote_cache: Mutex::new(VoteCache::new()),
            online_reps: Mutex::new(online),
            config,
            store,
            ledger,
            stats,
            events,
            write_queue,
            block_processor,
            cementer,
            vote_processor,
        })
    }

    // ── Wire entry points ───────────────────────────────────────────────

    /// `publish` from a peer. `false` means backpressure refused it.
    pub fn on_publish(&self, block: Block) -> bool {
        self.block_processor.add(block, BlockSource::Live)
    }

    /// A locally-forged block; never refused.
    pub fn on_local_block(&self, block: Block) {
        self.block_processor.add(block, BlockSource::Local);
    }

    /// A block pulled by bootstrap.
    pub fn on_bootstrap_block(&self, block: Block) -> bool {
        self.block_processor.add(block, BlockSource::Bootstrap)
    }

    /// `confirm_ack`: validate and dispatch a vote, then act on any
    /// confirmations it produced.
    pub fn on_vote(&self, vote: &Vote, now: Timestamp) -> Result<VoteDispatch, VoteError> {
        let dispatch = {
            let mut active = self.active.lock().expect("active elections lock poisoned");
            let mut cache = self.vote_cache.lock().expect("vote cache lock poisoned");
            let mut online = self.online_reps.lock().expect("online reps lock poisoned");
            self.vote_processor
                .process(vote, &mut active, &mut cache, &mut online, now)?
        };
        for status in &dispatch.confirmed {
            self.confirm_election(status, now);
        }
        if dispatch.applied > 0 || dispatch.cached > 0 {
            self.persist_vote(vote);
        }
        Ok(dispatch)
    }

    /// Keep the newest observed vote per representative on disk so replay
    /// protection survives a restart.
    fn persist_vote(&self, vote: &Vote) {
        let Ok(bytes) = bincode::serialize(vote) else {
            return;
        };
        let _guard = self.write_queue.wait(Writer::OnlineWeight);
        let Ok(mut txn) = self.store.tx_begin_write() else {
            return;
        };
        let newer = match self.store.vote.get(&txn, &vote.voting_account) {
            Ok(Some(existing)) => bincode::deserialize::<Vote>(&existing)
                .map(|old| vote.timestamp > old.timestamp)
                .unwrap_or(true),
            Ok(None) => true,
            Err(_) => false,
        };
        if !newer {
            txn.abort();
            return;
        }
        if self
            .store
            .vote
            .put(&mut txn, &vote.voting_account, &bytes)
            .is_ok()
        {
            let _ = txn.commit();
        }
    }

    /// `confirm_req`: answer from the vote history, generating where needed.
    pub fn on_confirm_req(
        &self,
        targets: &[(Root, BlockHash)],
        now: Timestamp,
    ) -> Vec<Arc<Vote>> {
        match &self.vote_generator {
            Some(generator) => generator
                .lock()
                .expect("vote generator lock poisoned")
                .votes_for(targets, now),
            None => Vec::new(),
        }
    }

    // ── Pipeline tick ───────────────────────────────────────────────────

    /// Drain one processing batch and route the results; then drain the
    /// cementer and promote anything it unblocked.
    pub fn tick(&self, now: Timestamp) -> Result<TickResult, NodeError> {
        let processed = self.block_processor.process_batch(now)?;
        let mut result = TickResult::default();
        let confirmed = self.route_processed(&processed, &mut result, now)?;
        result.processed = processed;
        for status in &confirmed {
            self.confirm_election(status, now);
        }

        // Expire elections past their budget.
        let expired = {
            let mut active = self.active.lock().expect("active elections lock poisoned");
            active.cleanup_expired(self.config.election_timeout_secs, now)
        };
        for _ in &expired {
            self.stats.increment(counter::ELECTIONS_EXPIRED);
        }

        result.cemented = self.cementer.run_batch()?;
        for hash in &result.cemented {
            self.promote_deferred(hash, now)?;
        }
        Ok(result)
    }

    /// Synchronous full drain, for tests and shutdown.
    pub fn flush(&self, now: Timestamp) -> Result<TickResult, NodeError> {
        let mut total = TickResult::default();
        loop {
            let tick = self.tick(now)?;
            let idle = tick.processed.is_empty()
                && tick.cemented.is_empty()
                && self.block_processor.queue_len() == 0
                && self.cementer.queue_len() == 0;
            total.processed.extend(tick.processed);
            total.republish.extend(tick.republish);
            total.rebroadcast_winners.extend(tick.rebroadcast_winners);
            total.cemented.extend(tick.cemented);
            if idle {
                return Ok(total);
            }
        }
    }

    fn route_processed(
        &self,
        items: &[ProcessedItem],
        out: &mut TickResult,
        now: Timestamp,
    ) -> Result<Vec<ElectionStatus>, NodeError> {
        let mut confirmed = Vec::new();
        for item in items {
            match item.status {
                BlockStatus::Progress => {
                    out.republish.push(item.block.clone());
                    confirmed.extend(self.start_election(
                        item.block.clone(),
                        item.source == BlockSource::Local,
                        now,
                    )?);
                }
                BlockStatus::Fork => {
                    // The applied sibling is the winner until votes say
                    // otherwise; remind the sender of it.
                    if let Some(occupant) = self.occupant_of(&item.block)? {
                        out.rebroadcast_winners.push(occupant.clone());
                        confirmed.extend(self.start_election(occupant, false, now)?);
                        confirmed.extend(self.start_election(item.block.clone(), false, now)?);
                    }
                }
                _ => {}
            }
        }
        Ok(confirmed)
    }

    /// The applied block occupying the same position as `block`.
    fn occupant_of(&self, block: &Block) -> Result<Option<Block>, NodeError> {
        let txn = self.store.tx_begin_read()?;
        let hash = if block.previous().is_zero() {
            match block.account_field() {
                Some(account) => self
                    .ledger
                    .account_info(&txn, &account)?
                    .map(|info| info.open_block),
                None => None,
            }
        } else {
            self.ledger.successor(&txn, &block.previous())?
        };
        match hash {
            Some(hash) => Ok(self.ledger.block_get(&txn, &hash)?.map(|saved| saved.block)),
            None => Ok(None),
        }
    }

    /// Offer a block to the election container, seeding cached votes when a
    /// new election starts. Returns any confirmations the seeding caused.
    fn start_election(
        &self,
        block: Block,
        local_origin: bool,
        now: Timestamp,
    ) -> Result<Vec<ElectionStatus>, NodeError> {
        let hash = block.hash();
        let predecessor_confirmed = {
            let txn = self.store.tx_begin_read()?;
            if self.ledger.block_confirmed(&txn, &hash)? {
                // Nothing left to elect.
                return Ok(Vec::new());
            }
            let previous = block.previous();
            previous.is_zero() || self.ledger.block_confirmed(&txn, &previous)?
        };

        let inserted = {
            let mut active = self.active.lock().expect("active elections lock poisoned");
            active.insert(block, predecessor_confirmed, local_origin, now)
        };

        let mut confirmed = Vec::new();
        match inserted {
            InsertResult::Started | InsertResult::Joined => {
                if inserted == InsertResult::Started {
                    self.stats.increment(counter::ELECTIONS_STARTED);
                }
                // Seed from votes that arrived before the election.
                let cached = {
                    let mut cache = self.vote_cache.lock().expect("vote cache lock poisoned");
                    cache.drain(&hash)
                };
                if !cached.is_empty() {
                    let mut active =
                        self.active.lock().expect("active elections lock poisoned");
                    for vote in cached {
                        if let Ok((_, Some(status))) = active.vote(
                            &vote.voter,
                            vote.timestamp,
                            &hash,
                            vote.weight,
                            now,
                        ) {
                            self.stats.increment(counter::ELECTIONS_CONFIRMED);
                            confirmed.push(status);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(confirmed)
    }

    /// Act on a confirmed election: remember the winner, force it into the
    /// ledger if a sibling occupies its position, hand it to the cementer,
    /// and pin the final vote.
    fn confirm_election(&self, status: &ElectionStatus, _now: Timestamp) {
        let winner = &status.winner;
        let winner_hash = winner.hash();

        self.recently_cemented
            .lock()
            .expect("recently cemented lock poisoned")
            .push(winner_hash);

        let applied = {
            match self.store.tx_begin_read() {
                Ok(txn) => self
                    .ledger
                    .block_exists(&txn, &winner_hash)
                    .unwrap_or(false),
                Err(_) => false,
            }
        };
        if !applied {
            // The ledger holds a losing sibling; the processor rolls it
            // back and applies the winner before cementing can reach it.
            self.block_processor.add(winner.clone(), BlockSource::Forced);
        }
        self.cementer.add(winner_hash);

        // A final-vote majority pins this root permanently.
        if status.final_tally > 0 {
            let root = QualifiedRoot::new(winner.root(), winner.previous());
            let _guard = self.write_queue.wait(Writer::OnlineWeight);
            if let Ok(mut txn) = self.store.tx_begin_write() {
                let recorded = self
                    .store
                    .final_vote
                    .put(&mut txn, &root, &winner_hash)
                    .unwrap_or(false);
                if txn.commit().is_err() || !recorded {
                    tracing::warn!(%winner_hash, "final vote not recorded");
                }
            }
        }

        let root = QualifiedRoot::new(winner.root(), winner.previous());
        let mut active = self.active.lock().expect("active elections lock poisoned");
        active.erase(&root);
    }

    /// Release elections that were waiting for `hash` to cement.
    fn promote_deferred(&self, hash: &BlockHash, now: Timestamp) -> Result<(), NodeError> {
        let blocks = {
            let mut active = self.active.lock().expect("active elections lock poisoned");
            active.take_deferred(hash)
        };
        let mut confirmed = Vec::new();
        for block in blocks {
            confirmed.extend(self.start_election(block, false, now)?);
        }
        for status in &confirmed {
            self.confirm_election(status, now);
        }
        Ok(())
    }

    // ── Periodic maintenance ────────────────────────────────────────────

    /// Sample online stake, persist it, refresh the quorum delta.
    pub fn sample_online_weight(&self, now: Timestamp) -> Result<(), NodeError> {
        let (sampled, delta) = {
            let mut online = self.online_reps.lock().expect("online reps lock poisoned");
            let sampled = online.sample(now, |rep| self.ledger.weight(rep));
            (sampled, online.quorum_delta())
        };
        {
            let _guard = self.write_queue.wait(Writer::OnlineWeight);
            let mut txn = self.store.tx_begin_write()?;
            self.store.online_weight.put(&mut txn, now, sampled)?;
            let window = self.config.online_weight_window_secs;
            let retain_secs = window.saturating_mul(4032);
            self.store
                .online_weight
                .trim(&mut txn, Timestamp::new(now.as_secs().saturating_sub(retain_secs)))?;
            txn.commit()?;
        }
        self.active
            .lock()
            .expect("active elections lock poisoned")
            .set_quorum_delta(delta);
        Ok(())
    }

    /// Emit votes for ongoing elections from the local representative key.
    pub fn generate_votes(&self, now: Timestamp, is_final: bool) -> Vec<Arc<Vote>> {
        let Some(generator) = &self.vote_generator else {
            return Vec::new();
        };
        let targets: Vec<(Root, BlockHash)> = {
            let active = self.active.lock().expect("active elections lock poisoned");
            active
                .active_roots()
                .into_iter()
                .filter_map(|(root, leading)| leading.map(|hash| (root.root, hash)))
                .collect()
        };
        if targets.is_empty() {
            return Vec::new();
        }
        generator
            .lock()
            .expect("vote generator lock poisoned")
            .generate(&targets, is_final, now)
    }

    /// One pruning sweep over up to `max_accounts` accounts.
    pub fn prune(&self, now: Timestamp, max_accounts: usize) -> Result<u64, NodeError> {
        if !self.config.pruning_enabled {
            return Ok(0);
        }
        let accounts: Vec<Account> = {
            let txn = self.store.tx_begin_read()?;
            self.store
                .account
                .iter_from(&txn, None, max_accounts)?
                .into_iter()
                .map(|(account, _)| account)
                .collect()
        };
        let config = self.config.pruning();
        let mut pruned = 0;
        for account in accounts {
            let _guard = self.write_queue.wait(Writer::Pruning);
            let mut txn = self.store.tx_begin_write()?;
            let stats = self.ledger.prune_account(&mut txn, &account, &config, now)?;
            txn.commit()?;
            pruned += stats.blocks_pruned;
        }
        Ok(pruned)
    }

    /// Representatives whose weight crosses the principal threshold: the
    /// flood targets for locally-forged blocks.
    pub fn principal_reps(&self) -> Vec<Account> {
        let online = self.online_reps.lock().expect("online reps lock poisoned");
        self.ledger
            .rep_weights
            .all()
            .into_iter()
            .filter(|(_, weight)| online.is_principal(Amount::raw(*weight)))
            .map(|(rep, _)| rep)
            .collect()
    }
}
