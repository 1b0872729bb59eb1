//! Pruned table — hashes of erased blocks whose existence is remembered.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use strand_types::BlockHash;

#[derive(Clone, Copy)]
pub struct PrunedStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl PrunedStore {
    pub fn put(&self, txn: &mut WriteTransaction, hash: &BlockHash) -> Result<(), StoreError> {
        self.db.put(txn.raw_mut(), hash.as_bytes(), &[])?;
        Ok(())
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
