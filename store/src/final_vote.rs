//! Final-vote table — the hash each qualified root was finally committed to.
//!
//! Once a final vote is recorded for a root, the node will never vote for a
//! different hash at that root, even across restarts.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use strand_types::{BlockHash, QualifiedRoot};

#[derive(Clone, Copy)]
pub struct FinalVoteStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl FinalVoteStore {
    /// Record a final vote. Returns `false` when a different hash is already
    /// recorded for this root; the existing commitment is kept.
    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        root: &QualifiedRoot,
        hash: &BlockHash,
    ) -> Result<bool, StoreError> {
        let key = root.to_bytes();
        if let Some(existing) = self.db.get(txn.raw(), &key)? {
            let existing: [u8; 32] = existing
                .try_into()
                .map_err(|_| StoreError::corrupted("final_vote", "value is not 32 bytes"))?;
            return Ok(BlockHash::new(existing) == *hash);
        }
        self.db.put(txn.raw_mut(), &key, hash.as_bytes())?;
        Ok(true)
    }

    pub fn get(
        &self,
        txn: &dyn Transaction,
        root: &QualifiedRoot,
    ) -> Result<Option<BlockHash>, StoreError> {
        match self.db.get(txn.raw(), &root.to_bytes())? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| StoreError::corrupted("final_vote", "value is not 32 bytes"))?;
                Ok(Some(BlockHash::new(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn del(
        &self,
        txn: &mut WriteTransaction,
        root: &QualifiedRoot,
    ) -> Result<(), StoreError> {
        self.db.delete(txn.raw_mut(), &root.to_bytes())?;
        Ok(())
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
