//! Unchecked table — blocks parked on a missing dependency.
//!
//! Multi-valued: the key is the missing dependency hash followed by the
//! waiting block's own hash, so all dependents of one hash form a contiguous
//! range. Values are the ledger's block encoding plus the arrival timestamp.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use strand_types::{BlockHash, Timestamp};

/// A parked block: the serialized block and when it arrived.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UncheckedValue {
    pub block_bytes: Vec<u8>,
    pub received: Timestamp,
}

fn key_bytes(dependency: &BlockHash, block_hash: &BlockHash) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(dependency.as_bytes());
    out[32..].copy_from_slice(block_hash.as_bytes());
    out
}

#[derive(Clone, Copy)]
pub struct UncheckedStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl UncheckedStore {
    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        dependency: &BlockHash,
        block_hash: &BlockHash,
        value: &UncheckedValue,
    ) -> Result<(), StoreError> {
        let bytes =
            bincode::serialize(value).map_err(|e| StoreError::corrupted("unchecked", e))?;
        self.db
            .put(txn.raw_mut(), &key_bytes(dependency, block_hash), &bytes)?;
        Ok(())
    }

    pub fn del(
        &self,
        txn: &mut WriteTransaction,
        dependency: &BlockHash,
        block_hash: &BlockHash,
    ) -> Result<(), StoreError> {
        self.db
            .delete(txn.raw_mut(), &key_bytes(dependency, block_hash))?;
        Ok(())
    }

    /// All blocks waiting on `dependency`.
    pub fn iter_dependents(
        &self,
        txn: &dyn Transaction,
        dependency: &BlockHash,
    ) -> Result<Vec<(BlockHash, UncheckedValue)>, StoreError> {
        let mut out = Vec::new();
        let lower = key_bytes(dependency, &BlockHash::ZERO);
        let bounds = (Bound::Included(lower.as_slice()), Bound::<&[u8]>::Unbounded);
        for result in self.db.range(txn.raw(), &bounds)? {
            let (key, value) = result?;
            let key: [u8; 64] = key
                .try_into()
                .map_err(|_| StoreError::corrupted("unchecked", "key is not 64 bytes"))?;
            if &key[..32] != dependency.as_bytes() {
                break;
            }
            let mut block_hash = [0u8; 32];
            block_hash.copy_from_slice(&key[32..]);
            let value: UncheckedValue = bincode::deserialize(value)
                .map_err(|e| StoreError::corrupted("unchecked", e))?;
            out.push((BlockHash::new(block_hash), value));
        }
        Ok(out)
    }

    /// Full scan as `(dependency, block_hash, value)` triples. The table is
    /// bounded by the in-memory buffer's capacity, so this stays small; used
    /// to rebuild arrival order at startup.
    pub fn iter_all(
        &self,
        txn: &dyn Transaction,
    ) -> Result<Vec<(BlockHash, BlockHash, UncheckedValue)>, StoreError> {
        let mut out = Vec::new();
        for result in self.db.iter(txn.raw())? {
            let (key, value) = result?;
            let key: [u8; 64] = key
                .try_into()
                .map_err(|_| StoreError::corrupted("unchecked", "key is not 64 bytes"))?;
            let mut dependency = [0u8; 32];
            let mut block_hash = [0u8; 32];
            dependency.copy_from_slice(&key[..32]);
            block_hash.copy_from_slice(&key[32..]);
            let value: UncheckedValue = bincode::deserialize(value)
                .map_err(|e| StoreError::corrupted("unchecked", e))?;
            out.push((BlockHash::new(dependency), BlockHash::new(block_hash), value));
        }
        Ok(out)
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
