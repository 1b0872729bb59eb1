//! Block table — serialized block + sideband keyed by hash.
//!
//! Values are opaque to the store; the ledger crate owns the block encoding
//! (one-byte type tag, then the type-specific fields, then the sideband).

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use strand_types::BlockHash;

#[derive(Clone, Copy)]
pub struct BlockStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl BlockStore {
    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        self.db.put(txn.raw_mut(), hash.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(txn.raw(), hash.as_bytes())?.map(|b| b.to_vec()))
    }

    pub fn exists(&self, txn: &dyn Transaction, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self.db.get(txn.raw(), hash.as_bytes())?.is_some())
    }

    pub fn del(&self, txn: &mut WriteTransaction, hash: &BlockHash) -> Result<(), StoreError> {
        self.db.delete(txn.raw_mut(), hash.as_bytes())?;
        Ok(())
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
