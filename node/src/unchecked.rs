//! Unchecked buffer — blocks whose dependency has not arrived yet.
//!
//! Entries live in the store's unchecked table, keyed by the missing hash;
//! this wrapper keeps the arrival order and count in memory so capacity
//! enforcement (evict the oldest, accept the new) never scans the table.
//! Only the block processor mutates it, always inside its own write
//! transaction.

use std::collections::VecDeque;
use strand_ledger::{Block, LedgerError};
use strand_store::{Store, Transaction, UncheckedValue, WriteTransaction};
use strand_types::{BlockHash, Timestamp};

pub struct UncheckedMap {
    /// Arrival order of `(dependency, block_hash)` pairs, oldest first.
    order: VecDeque<(BlockHash, BlockHash)>,
    max_size: usize,
}

impl UncheckedMap {
    pub fn new(max_size: usize) -> Self {
        Self {
            order: VecDeque::new(),
            max_size,
        }
    }

    /// Rebuild arrival order from the table at startup. The table is bounded
    /// by this buffer's capacity, so a full scan is cheap.
    pub fn restore(&mut self, store: &Store, txn: &dyn Transaction) -> Result<(), LedgerError> {
        let mut entries = store.unchecked.iter_all(txn)?;
        entries.sort_by_key(|(_, _, value)| value.received);
        self.order = entries
            .into_iter()
            .map(|(dependency, block_hash, _)| (dependency, block_hash))
            .collect();
        Ok(())
    }

    /// Park a block under its missing dependency. At capacity the oldest
    /// entry is evicted to make room; the new entry is always accepted.
    /// Returns the evicted pair, if any.
    pub fn put(
        &mut self,
        store: &Store,
        txn: &mut WriteTransaction,
        dependency: BlockHash,
        block: &Block,
        now: Timestamp,
    ) -> Result<Option<(BlockHash, BlockHash)>, LedgerError> {
        let block_hash = block.hash();
        let mut evicted = None;
        if self.order.len() >= self.max_size {
            if let Some((old_dep, old_hash)) = self.order.pop_front() {
                store.unchecked.del(txn, &old_dep, &old_hash)?;
                evicted = Some((old_dep, old_hash));
            }
        }
        let value = UncheckedValue {
            block_bytes: bincode::serialize(block)
                .map_err(|e| LedgerError::Corrupted(format!("unchecked encode: {e}")))?,
            received: now,
        };
        store.unchecked.put(txn, &dependency, &block_hash, &value)?;
        self.order.push_back((dependency, block_hash));
        Ok(evicted)
    }

    /// Remove and return every block waiting on `dependency`.
    pub fn take_dependents(
        &mut self,
        store: &Store,
        txn: &mut WriteTransaction,
        dependency: &BlockHash,
    ) -> Result<Vec<Block>, LedgerError> {
        let raw = store.unchecked.iter_dependents(txn, dependency)?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let mut blocks = Vec::with_capacity(raw.len());
        for (block_hash, value) in raw {
            store.unchecked.del(txn, dependency, &block_hash)?;
            self.order
                .retain(|(dep, hash)| !(dep == dependency && *hash == block_hash));
            let block: Block = bincode::deserialize(&value.block_bytes)
                .map_err(|e| LedgerError::Corrupted(format!("unchecked decode: {e}")))?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strand_ledger::SendBlock;
    use strand_store::StoreOptions;
    use strand_types::{Account, Amount, Signature};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, Arc<Store>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open_with(dir.path(), StoreOptions::dev()).unwrap());
        (dir, store)
    }

    fn block(previous: u8, destination: u8) -> Block {
        Block::Send(SendBlock {
            previous: BlockHash::new([previous; 32]),
            destination: Account::new([destination; 32]),
            balance: Amount::raw(0),
            signature: Signature::ZERO,
            work: 0,
        })
    }

    fn dep(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    #[test]
    fn put_and_take_dependents() {
        let (_dir, store) = open_store();
        let mut unchecked = UncheckedMap::new(8);
        let mut txn = store.tx_begin_write().unwrap();

        unchecked
            .put(&store, &mut txn, dep(1), &block(1, 1), Timestamp::new(10))
            .unwrap();
        unchecked
            .put(&store, &mut txn, dep(1), &block(1, 2), Timestamp::new(11))
            .unwrap();
        unchecked
            .put(&store, &mut txn, dep(2), &block(2, 1), Timestamp::new(12))
            .unwrap();
        assert_eq!(unchecked.len(), 3);

        let released = unchecked.take_dependents(&store, &mut txn, &dep(1)).unwrap();
        assert_eq!(released.len(), 2);
        assert_eq!(unchecked.len(), 1);
        assert!(unchecked
            .take_dependents(&store, &mut txn, &dep(1))
            .unwrap()
            .is_empty());
        txn.commit().unwrap();
    }

    #[test]
    fn capacity_evicts_oldest_and_accepts_new() {
        let (_dir, store) = open_store();
        let mut unchecked = UncheckedMap::new(2);
        let mut txn = store.tx_begin_write().unwrap();

        unchecked
            .put(&store, &mut txn, dep(1), &block(1, 1), Timestamp::new(10))
            .unwrap();
        unchecked
            .put(&store, &mut txn, dep(2), &block(2, 1), Timestamp::new(11))
            .unwrap();
        let evicted = unchecked
            .put(&store, &mut txn, dep(3), &block(3, 1), Timestamp::new(12))
            .unwrap();

        assert_eq!(evicted, Some((dep(1), block(1, 1).hash())));
        assert_eq!(unchecked.len(), 2);
        // The oldest is gone; the newest is present.
        assert!(unchecked.take_dependents(&store, &mut txn, &dep(1)).unwrap().is_empty());
        assert_eq!(
            unchecked.take_dependents(&store, &mut txn, &dep(3)).unwrap().len(),
            1
        );
        txn.commit().unwrap();
    }

    #[test]
    fn restore_rebuilds_order_from_table() {
        let (_dir, store) = open_store();
        {
            let mut unchecked = UncheckedMap::new(8);
            let mut txn = store.tx_begin_write().unwrap();
            unchecked
                .put(&store, &mut txn, dep(1), &block(1, 1), Timestamp::new(20))
                .unwrap();
            unchecked
                .put(&store, &mut txn, dep(2), &block(2, 1), Timestamp::new(10))
                .unwrap();
            txn.commit().unwrap();
        }

        let mut restored = UncheckedMap::new(2);
        let txn = store.tx_begin_read().unwrap();
        restored.restore(&store, &txn).unwrap();
        drop(txn);
        assert_eq!(restored.len(), 2);

        // Capacity 2 and full: the next put evicts the entry with the
        // oldest persisted arrival time, dep(2).
        let mut txn = store.tx_begin_write().unwrap();
        let evicted = restored
            .put(&store, &mut txn, dep(3), &block(3, 1), Timestamp::new(30))
            .unwrap();
        assert_eq!(evicted, Some((dep(2), block(2, 1).hash())));
        txn.commit().unwrap();
    }
}
