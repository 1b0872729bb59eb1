//! Confirmation-height table — the cemented prefix of each account.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use serde::{Deserialize, Serialize};
use strand_types::{Account, BlockHash};

/// Cemented prefix marker: blocks at height ≤ `height` are irreversible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationHeightInfo {
    pub height: u64,
    /// Hash of the block at `height`.
    pub frontier: BlockHash,
}

impl ConfirmationHeightInfo {
    pub fn new(height: u64, frontier: BlockHash) -> Self {
        Self { height, frontier }
    }

    pub fn zero() -> Self {
        Self {
            height: 0,
            frontier: BlockHash::ZERO,
        }
    }
}

#[derive(Clone, Copy)]
pub struct ConfirmationHeightStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl ConfirmationHeightStore {
    pub fn get(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<Option<ConfirmationHeightInfo>, StoreError> {
        match self.db.get(txn.raw(), account.as_bytes())? {
            Some(bytes) => {
                let info = bincode::deserialize(bytes)
                    .map_err(|e| StoreError::corrupted("confirmation_height", e))?;
                Ok(Some(info))
            }
            None => Ok(None),
        }
    }

    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info)
            .map_err(|e| StoreError::corrupted("confirmation_height", e))?;
        self.db.put(txn.raw_mut(), account.as_bytes(), &bytes)?;
        Ok(())
    }

    pub fn del(&self, txn: &mut WriteTransaction, account: &Account) -> Result<(), StoreError> {
        self.db.delete(txn.raw_mut(), account.as_bytes())?;
        Ok(())
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }

    /// Full scan, used at startup to rebuild the cemented-block counter.
    pub fn iter_all(
        &self,
        txn: &dyn Transaction,
    ) -> Result<Vec<(Account, ConfirmationHeightInfo)>, StoreError> {
        let mut out = Vec::new();
        for result in self.db.iter(txn.raw())? {
            let (key, value) = result?;
            let key: [u8; 32] = key.try_into().map_err(|_| {
                StoreError::corrupted("confirmation_height", "key is not 32 bytes")
            })?;
            let info: ConfirmationHeightInfo = bincode::deserialize(value)
                .map_err(|e| StoreError::corrupted("confirmation_height", e))?;
            out.push((Account::new(key), info));
        }
        Ok(out)
    }
}
