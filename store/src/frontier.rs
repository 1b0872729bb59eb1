//! Frontier table — reverse lookup from frontier hash to owning account.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use strand_types::{Account, BlockHash};

#[derive(Clone, Copy)]
pub struct FrontierStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl FrontierStore {
    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        account: &Account,
    ) -> Result<(), StoreError> {
        self.db
            .put(txn.raw_mut(), hash.as_bytes(), account.as_bytes())?;
        Ok(())
    }

    pub fn get(
        &self,
        txn: &dyn Transaction,
        hash: &BlockHash,
    ) -> Result<Option<Account>, StoreError> {
        match self.db.get(txn.raw(), hash.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| StoreError::corrupted("frontiers", "value is not 32 bytes"))?;
                Ok(Some(Account::new(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn del(&self, txn: &mut WriteTransaction, hash: &BlockHash) -> Result<(), StoreError> {
        self.db.delete(txn.raw_mut(), hash.as_bytes())?;
        Ok(())
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
