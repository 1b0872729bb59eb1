//! The block processor — the single writer of the steady-state path.
//!
//! Three input queues feed one drain loop: locally-forged blocks take
//! priority, forced entries carry election winners that must displace an
//! applied sibling, and everything from peers queues standard. Batches are
//! signature-checked in parallel before the write transaction opens; inside
//! the transaction each block is classified by the ledger and routed:
//! applied blocks drain their unchecked dependents into the same pass, gaps
//! park in the unchecked buffer, forks surface to the election layer.

use crate::event_bus::{EventBus, NodeEvent};
use crate::stats::{counter, StatsCounter};
use crate::unchecked::UncheckedMap;
use crate::write_queue::{WriteQueue, Writer};
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use strand_crypto::verify_signature;
use strand_ledger::{Block, BlockStatus, Ledger, LedgerError};
use strand_types::{Account, BlockHash, Timestamp};

/// Where an incoming block came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSource {
    /// Gossip from a peer.
    Live,
    /// Local wallet or RPC.
    Local,
    /// Bootstrap pull.
    Bootstrap,
    /// Re-queued from the unchecked buffer.
    Unchecked,
    /// Election winner that must displace an applied sibling.
    Forced,
}

/// One classified block, handed to the node for routing.
#[derive(Clone, Debug)]
pub struct ProcessedItem {
    pub block: Block,
    pub status: BlockStatus,
    pub source: BlockSource,
}

struct Queues {
    priority: VecDeque<Block>,
    forced: VecDeque<Block>,
    standard: VecDeque<(Block, BlockSource)>,
}

impl Queues {
    fn len(&self) -> usize {
        self.priority.len() + self.forced.len() + self.standard.len()
    }
}

pub struct BlockProcessor {
    ledger: Arc<Ledger>,
    write_queue: Arc<WriteQueue>,
    stats: Arc<StatsCounter>,
    events: Arc<EventBus>,
    queues: Mutex<Queues>,
    condvar: Condvar,
    unchecked: Mutex<UncheckedMap>,
    max_queue: usize,
    batch_size: usize,
}

impl BlockProcessor {
    pub fn new(
        ledger: Arc<Ledger>,
        write_queue: Arc<WriteQueue>,
        stats: Arc<StatsCounter>,
        events: Arc<EventBus>,
        max_queue: usize,
        batch_size: usize,
        unchecked_max: usize,
    ) -> Self {
        Self {
            ledger,
            write_queue,
            stats,
            events,
            queues: Mutex::new(Queues {
                priority: VecDeque::new(),
                forced: VecDeque::new(),
                standard: VecDeque::new(),
            }),
            condvar: Condvar::new(),
            unchecked: Mutex::new(UncheckedMap::new(unchecked_max)),
            max_queue,
            batch_size,
        }
    }

    /// Reload the unchecked buffer from the store at startup.
    pub fn restore_unchecked(&self) -> Result<(), LedgerError> {
        let txn = self.ledger.store.tx_begin_read()?;
        self.unchecked
            .lock()
            .expect("unchecked lock poisoned")
            .restore(&self.ledger.store, &txn)
    }

    /// Enqueue a block. Peer-facing sources are refused when full; local
    /// and forced entries always land.
    pub fn add(&self, block: Block, source: BlockSource) -> bool {
        let mut queues = self.queues.lock().expect("processor queue lock poisoned");
        match source {
            BlockSource::Local => queues.priority.push_back(block),
            BlockSource::Forced => queues.forced.push_back(block),
            BlockSource::Live | BlockSource::Bootstrap | BlockSource::Unchecked => {
                if queues.len() >= self.max_queue {
                    self.stats.increment(counter::QUEUE_OVERFLOW);
                    return false;
                }
                queues.standard.push_back((block, source));
            }
        }
        drop(queues);
        self.condvar.notify_one();
        true
    }

    pub fn full(&self) -> bool {
        self.queues.lock().expect("processor queue lock poisoned").len() >= self.max_queue
    }

    pub fn half_full(&self) -> bool {
        self.queues.lock().expect("processor queue lock poisoned").len() >= self.max_queue / 2
    }

    pub fn queue_len(&self) -> usize {
        self.queues.lock().expect("processor queue lock poisoned").len()
    }

    pub fn unchecked_len(&self) -> usize {
        self.unchecked.lock().expect("unchecked lock poisoned").len()
    }

    /// Block the calling thread until work arrives.
    pub fn wait_for_work(&self) {
        let mut queues = self.queues.lock().expect("processor queue lock poisoned");
        while queues.len() == 0 {
            queues = self
                .condvar
                .wait(queues)
                .expect("processor queue lock poisoned");
        }
    }

    /// Drain and classify one batch. Returns the classified items so the
    /// caller can feed elections and republish.
    pub fn process_batch(&self, now: Timestamp) -> Result<Vec<ProcessedItem>, LedgerError> {
        let batch = self.take_batch();
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        // Stateless signature stage, parallel across the batch. Only blocks
        // whose signer is derivable without the store are filtered here; the
        // ledger re-derives signers for the rest (and for epoch blocks).
        let (batch, bad_signature): (Vec<_>, Vec<_>) = batch
            .into_par_iter()
            .partition(|(block, _)| precheck_signature(block));

        for (block, _) in &bad_signature {
            self.stats.increment(counter::BLOCKS_BAD_SIGNATURE);
            tracing::debug!(hash = %block.hash(), "dropping block with bad signature");
        }

        let mut items = Vec::with_capacity(batch.len());
        let mut emissions: Vec<NodeEvent> = Vec::new();
        {
            let _guard = self.write_queue.wait(Writer::BlockProcessor);
            let mut txn = self.ledger.store.tx_begin_write()?;
            let mut work: VecDeque<(Block, BlockSource)> = batch.into();
            let mut unchecked = self.unchecked.lock().expect("unchecked lock poisoned");

            while let Some((block, source)) = work.pop_front() {
                if source == BlockSource::Forced {
                    self.displace_sibling(&mut txn, &block, &mut unchecked, &mut emissions, now)?;
                }
                let status = self.ledger.process(&mut txn, &block)?;
                self.stats.increment(counter::BLOCKS_PROCESSED);
                self.account_status(status);

                match status {
                    BlockStatus::Progress => {
                        let hash = block.hash();
                        let account = match block.account_field() {
                            Some(account) => account,
                            None => self.ledger.account_of(&txn, &hash)?.unwrap_or(Account::ZERO),
                        };
                        emissions.push(NodeEvent::BlockProcessed { hash, account });
                        if let Some(balance) = self.ledger.balance(&txn, &hash)? {
                            emissions.push(NodeEvent::BalanceChanged { account, balance });
                        }
                        // Dependents waiting on this hash, and epoch-opens
                        // waiting on any send to their account.
                        let mut released =
                            unchecked.take_dependents(&self.ledger.store, &mut txn, &hash)?;
                        if let Some(destination) = send_destination(&block) {
                            released.extend(unchecked.take_dependents(
                                &self.ledger.store,
                                &mut txn,
                                &BlockHash::new(*destination.as_bytes()),
                            )?);
                        }
                        for dependent in released {
                            work.push_back((dependent, BlockSource::Unchecked));
                        }
                    }
                    BlockStatus::GapPrevious => {
                        let evicted = unchecked.put(
                            &self.ledger.store,
                            &mut txn,
                            block.previous(),
                            &block,
                            now,
                        )?;
                        if evicted.is_some() {
                            self.stats.increment(counter::UNCHECKED_EVICTED);
                        }
                    }
                    BlockStatus::GapSource => {
                        if let Some(source_hash) = gap_source_dependency(&block) {
                            let evicted = unchecked.put(
                                &self.ledger.store,
                                &mut txn,
                                source_hash,
                                &block,
                                now,
                            )?;
                            if evicted.is_some() {
                                self.stats.increment(counter::UNCHECKED_EVICTED);
                            }
                        }
                    }
                    BlockStatus::GapEpochOpenPending => {
                        // Keyed by the account so the next send to it
                        // releases the epoch-open.
                        if let Some(account) = block.account_field() {
                            let evicted = unchecked.put(
                                &self.ledger.store,
                                &mut txn,
                                BlockHash::new(*account.as_bytes()),
                                &block,
                                now,
                            )?;
                            if evicted.is_some() {
                                self.stats.increment(counter::UNCHECKED_EVICTED);
                            }
                        }
                    }
                    BlockStatus::Fork => {
                        emissions.push(NodeEvent::ForkDetected {
                            root_previous: block.previous(),
                            incoming: block.hash(),
                        });
                    }
                    _ => {}
                }

                items.push(ProcessedItem {
                    block,
                    status,
                    source,
                });
            }
            drop(unchecked);
            txn.commit()?;
        }

        // Observers fire strictly after commit.
        for event in &emissions {
            self.events.emit(event);
        }
        Ok(items)
    }

    /// Drain everything; test and shutdown helper. Dependency resolution is
    /// not bypassed: drained gaps simply stay in the unchecked buffer.
    pub fn flush(&self, now: Timestamp) -> Result<Vec<ProcessedItem>, LedgerError> {
        let mut all = Vec::new();
        loop {
            let items = self.process_batch(now)?;
            if items.is_empty() && self.queue_len() == 0 {
                return Ok(all);
            }
            all.extend(items);
        }
    }

    fn take_batch(&self) -> Vec<(Block, BlockSource)> {
        let mut queues = self.queues.lock().expect("processor queue lock poisoned");
        let mut batch = Vec::with_capacity(self.batch_size.min(queues.len()));
        while batch.len() < self.batch_size {
            if let Some(block) = queues.forced.pop_front() {
                batch.push((block, BlockSource::Forced));
            } else if let Some(block) = queues.priority.pop_front() {
                batch.push((block, BlockSource::Local));
            } else if let Some(entry) = queues.standard.pop_front() {
                batch.push(entry);
            } else {
                break;
            }
        }
        batch
    }

    /// A forced winner displaces the applied sibling at its position: the
    /// sibling's chain rolls back (unless cemented) and its descendants
    /// re-enter the unchecked buffer keyed by their predecessors.
    fn displace_sibling(
        &self,
        txn: &mut strand_store::WriteTransaction,
        winner: &Block,
        unchecked: &mut UncheckedMap,
        emissions: &mut Vec<NodeEvent>,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        let winner_hash = winner.hash();
        let previous = winner.previous();
        let occupant = if previous.is_zero() {
            winner
                .account_field()
                .and_then(|account| self.ledger.account_info(txn, &account).transpose())
                .transpose()?
                .map(|info| info.open_block)
        } else {
            self.ledger.successor(txn, &previous)?
        };
        let Some(occupant) = occupant else {
            return Ok(());
        };
        if occupant == winner_hash {
            return Ok(());
        }
        if self.ledger.block_confirmed(txn, &occupant)? {
            // Cementation wins over any later vote outcome.
            tracing::warn!(%occupant, winner = %winner_hash, "ignoring forced winner against cemented sibling");
            return Ok(());
        }

        let rolled = self.ledger.rollback(txn, &occupant)?;
        self.stats
            .add(counter::BLOCKS_ROLLED_BACK, rolled.len() as u64);
        emissions.push(NodeEvent::RolledBack {
            count: rolled.len(),
            winner: winner_hash,
        });
        for saved in rolled {
            // The loser itself stays dead; its descendants may become valid
            // again on top of the winner.
            if saved.hash() == occupant {
                continue;
            }
            let previous = saved.block.previous();
            unchecked.put(&self.ledger.store, txn, previous, &saved.block, now)?;
        }
        Ok(())
    }

    fn account_status(&self, status: BlockStatus) {
        let name = match status {
            BlockStatus::Progress => counter::BLOCKS_PROGRESS,
            BlockStatus::Old => counter::BLOCKS_OLD,
            BlockStatus::Fork => counter::BLOCKS_FORK,
            BlockStatus::GapPrevious
            | BlockStatus::GapSource
            | BlockStatus::GapEpochOpenPending => counter::BLOCKS_GAP,
            BlockStatus::BadSignature => counter::BLOCKS_BAD_SIGNATURE,
            BlockStatus::InsufficientWork => counter::BLOCKS_INSUFFICIENT_WORK,
            _ => counter::BLOCKS_OTHER_DROP,
        };
        self.stats.increment(name);
    }
}

/// Stateless signature filter. `true` means "not provably bad": legacy
/// chained blocks (signer only known from chain context) and state blocks
/// not signed by their account (potential epoch blocks, signed by the epoch
/// signer) pass through for the ledger to decide.
fn precheck_signature(block: &Block) -> bool {
    let signer = match block {
        Block::Open(open) => open.account,
        Block::State(state) => state.account,
        _ => return true,
    };
    let hash = block.hash();
    if verify_signature(hash.as_bytes(), block.signature(), &signer.public_key()) {
        return true;
    }
    matches!(block, Block::State(_))
}

/// The account whose parked epoch-open a `Progress` send may release.
fn send_destination(block: &Block) -> Option<Account> {
    match block {
        Block::Send(send) => Some(send.destination),
        Block::State(state) => Some(state.link.as_account()),
        _ => None,
    }
}

/// The missing dependency hash of a `GapSource` classification.
fn gap_source_dependency(block: &Block) -> Option<BlockHash> {
    match block {
        Block::Open(open) => Some(open.source),
        Block::Receive(receive) => Some(receive.source),
        Block::State(state) => Some(state.link.as_block_hash()),
        _ => None,
    }
}
