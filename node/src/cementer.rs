//! Confirmation-height processor — cements the confirmed prefix.
//!
//! A confirmed block implies every ancestor reachable from it is confirmed
//! too: the blocks below it on its own chain, and recursively the source
//! chains of every receive among them. The walk uses an explicit stack and a
//! per-batch ceiling so catch-up after a long offline period never holds the
//! write queue for unbounded time.

use crate::event_bus::{EventBus, NodeEvent};
use crate::stats::{counter, StatsCounter};
use crate::write_queue::{WriteQueue, Writer};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use strand_ledger::{Ledger, LedgerError};
use strand_store::ConfirmationHeightInfo;
use strand_types::BlockHash;

/// Guard against cyclic receive graphs in corrupted stores.
const MAX_RECURSION_DEPTH: usize = 4096;

pub struct Cementer {
    ledger: Arc<Ledger>,
    write_queue: Arc<WriteQueue>,
    stats: Arc<StatsCounter>,
    events: Arc<EventBus>,
    queue: Mutex<VecDeque<BlockHash>>,
    max_queue: usize,
    batch_size: usize,
}

impl Cementer {
    pub fn new(
        ledger: Arc<Ledger>,
        write_queue: Arc<WriteQueue>,
        stats: Arc<StatsCounter>,
        events: Arc<EventBus>,
        max_queue: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            ledger,
            write_queue,
            stats,
            events,
            queue: Mutex::new(VecDeque::new()),
            max_queue,
            batch_size,
        }
    }

    /// Enqueue a confirmed hash for cementing. Bounded; a refusal means the
    /// caller must retry after a drain.
    pub fn add(&self, hash: BlockHash) -> bool {
        let mut queue = self.queue.lock().expect("cementer queue lock poisoned");
        if queue.len() >= self.max_queue {
            return false;
        }
        queue.push_back(hash);
        true
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().expect("cementer queue lock poisoned").len()
    }

    /// Cement queued hashes. Each queue entry gets its own write
    /// transaction and write-queue slot so the block processor interleaves
    /// rather than starves. Returns the hashes cemented, in commit order.
    pub fn run_batch(&self) -> Result<Vec<BlockHash>, LedgerError> {
        let mut cemented_total = Vec::new();
        loop {
            let Some(target) = self.queue.lock().expect("cementer queue lock poisoned").pop_front()
            else {
                break;
            };
            let cemented = {
                let _guard = self.write_queue.wait(Writer::ConfirmationHeight);
                let mut txn = self.ledger.store.tx_begin_write()?;
                let cemented = self.cement_with_dependencies(&mut txn, &target)?;
                txn.commit()?;
                cemented
            };
            // Observers fire after commit, in commit order.
            if !cemented.is_empty() {
                let txn = self.ledger.store.tx_begin_read()?;
                for hash in &cemented {
                    let account = self
                        .ledger
                        .account_of(&txn, hash)?
                        .unwrap_or(strand_types::Account::ZERO);
                    let amount = self.ledger.amount(&txn, hash)?;
                    self.events.emit(&NodeEvent::BlockConfirmed {
                        hash: *hash,
                        account,
                        amount,
                    });
                }
            }
            self.stats
                .add(counter::BLOCKS_CEMENTED, cemented.len() as u64);
            cemented_total.extend(cemented);
        }
        Ok(cemented_total)
    }

    /// Cement `target` and every uncemented ancestor it implies. Returns
    /// cemented hashes oldest-first.
    fn cement_with_dependencies(
        &self,
        txn: &mut strand_store::WriteTransaction,
        target: &BlockHash,
    ) -> Result<Vec<BlockHash>, LedgerError> {
        let mut cemented = Vec::new();
        let mut stack: Vec<BlockHash> = vec![*target];

        while let Some(&top) = stack.last() {
            if stack.len() > MAX_RECURSION_DEPTH {
                return Err(LedgerError::Corrupted(format!(
                    "receive-source recursion exceeded depth limit at {top}"
                )));
            }
            let Some(saved) = self.ledger.block_get(txn, &top)? else {
                // Already pruned or never arrived; nothing to cement here.
                stack.pop();
                continue;
            };
            let account = saved.account();
            let confirmed = self.ledger.confirmation_height(txn, &account)?;
            if saved.height() <= confirmed.height {
                stack.pop();
                continue;
            }

            // Collect the lowest uncemented slice of this chain, oldest
            // first. The deque caps at the batch size, discarding higher
            // hashes: cementation must fill from the bottom, and a capped
            // pass simply raises the floor for the next iteration.
            let lowest_height = confirmed.height + 1;
            let mut slice: VecDeque<BlockHash> = VecDeque::new();
            let mut cursor = saved;
            loop {
                slice.push_front(cursor.hash());
                if slice.len() > self.batch_size {
                    slice.pop_back();
                }
                if cursor.height() == lowest_height {
                    break;
                }
                let previous = cursor.block.previous();
                match self.ledger.block_get(txn, &previous)? {
                    Some(prev) => cursor = prev,
                    None => break,
                }
            }

            // Any receive in the slice drags its source chain in first.
            let mut deferred = None;
            for hash in &slice {
                let Some(block) = self.ledger.block_get(txn, hash)? else {
                    continue;
                };
                if !block.sideband.details.is_receive {
                    continue;
                }
                let source = match &block.block {
                    strand_ledger::Block::Open(open) => open.source,
                    strand_ledger::Block::Receive(receive) => receive.source,
                    strand_ledger::Block::State(state) => state.link.as_block_hash(),
                    _ => continue,
                };
                if self.ledger.block_exists(txn, &source)?
                    && !self.ledger.block_confirmed(txn, &source)?
                {
                    deferred = Some(source);
                    break;
                }
            }
            if let Some(source) = deferred {
                stack.push(source);
                continue;
            }

            // Cement the slice.
            let highest = *slice.back().expect("slice is non-empty");
            let highest_block = self
                .ledger
                .block_get(txn, &highest)?
                .expect("slice hashes were just read");
            self.ledger.set_confirmation_height(
                txn,
                &account,
                ConfirmationHeightInfo::new(highest_block.height(), highest),
            )?;
            cemented.extend(slice);
            if highest == top {
                stack.pop();
            }
            // Otherwise the batch ceiling split the chain; the loop resumes
            // from the same target with a raised floor.
        }
        Ok(cemented)
    }
}
