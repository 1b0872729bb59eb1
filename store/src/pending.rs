//! Pending table — sends awaiting their matching receive.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use std::ops::Bound;
use strand_types::{Account, PendingInfo, PendingKey};

#[derive(Clone, Copy)]
pub struct PendingStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl PendingStore {
    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        key: &PendingKey,
        info: &PendingInfo,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info).map_err(|e| StoreError::corrupted("pending", e))?;
        self.db.put(txn.raw_mut(), &key.to_bytes(), &bytes)?;
        Ok(())
    }

    pub fn get(
        &self,
        txn: &dyn Transaction,
        key: &PendingKey,
    ) -> Result<Option<PendingInfo>, StoreError> {
        match self.db.get(txn.raw(), &key.to_bytes())? {
            Some(bytes) => {
                let info = bincode::deserialize(bytes)
                    .map_err(|e| StoreError::corrupted("pending", e))?;
                Ok(Some(info))
            }
            None => Ok(None),
        }
    }

    pub fn exists(&self, txn: &dyn Transaction, key: &PendingKey) -> Result<bool, StoreError> {
        Ok(self.db.get(txn.raw(), &key.to_bytes())?.is_some())
    }

    pub fn del(&self, txn: &mut WriteTransaction, key: &PendingKey) -> Result<(), StoreError> {
        self.db.delete(txn.raw_mut(), &key.to_bytes())?;
        Ok(())
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }

    /// Enumerate the pending entries of one account in send-hash order.
    ///
    /// The key layout (account ‖ send_hash) clusters an account's entries, so
    /// this is a bounded range scan.
    pub fn iter_account(
        &self,
        txn: &dyn Transaction,
        account: &Account,
        limit: usize,
    ) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError> {
        let mut out = Vec::new();
        let lower = PendingKey::new(*account, strand_types::BlockHash::ZERO).to_bytes();
        let bounds = (
            Bound::Included(lower.as_slice()),
            Bound::<&[u8]>::Unbounded,
        );
        for result in self.db.range(txn.raw(), &bounds)? {
            if out.len() >= limit {
                break;
            }
            let (key, value) = result?;
            let key: [u8; 64] = key
                .try_into()
                .map_err(|_| StoreError::corrupted("pending", "key is not 64 bytes"))?;
            let key = PendingKey::from_bytes(&key);
            if key.receiving_account != *account {
                break;
            }
            let info: PendingInfo = bincode::deserialize(value)
                .map_err(|e| StoreError::corrupted("pending", e))?;
            out.push((key, info));
        }
        Ok(out)
    }

    /// Whether the account has any pending entry at all.
    pub fn any_for_account(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<bool, StoreError> {
        Ok(!self.iter_account(txn, account, 1)?.is_empty())
    }
}
