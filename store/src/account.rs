//! Account table — one record per account with at least one block.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use strand_types::{Account, Amount, BlockHash, Epoch, Timestamp};

/// Per-account head state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Frontier block hash.
    pub head: BlockHash,
    /// First block of the chain.
    pub open_block: BlockHash,
    /// Balance at the frontier.
    pub balance: Amount,
    /// Last time this account's chain was modified.
    pub modified: Timestamp,
    /// Chain length; the frontier's height.
    pub block_count: u64,
    /// Current representative.
    pub representative: Account,
    /// Highest epoch applied to this chain.
    pub epoch: Epoch,
}

#[derive(Clone, Copy)]
pub struct AccountStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl AccountStore {
    pub fn get(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Result<Option<AccountInfo>, StoreError> {
        match self.db.get(txn.raw(), account.as_bytes())? {
            Some(bytes) => {
                let info = bincode::deserialize(bytes)
                    .map_err(|e| StoreError::corrupted("accounts", e))?;
                Ok(Some(info))
            }
            None => Ok(None),
        }
    }

    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        account: &Account,
        info: &AccountInfo,
    ) -> Result<(), StoreError> {
        let bytes =
            bincode::serialize(info).map_err(|e| StoreError::corrupted("accounts", e))?;
        self.db.put(txn.raw_mut(), account.as_bytes(), &bytes)?;
        Ok(())
    }

    pub fn del(&self, txn: &mut WriteTransaction, account: &Account) -> Result<(), StoreError> {
        self.db.delete(txn.raw_mut(), account.as_bytes())?;
        Ok(())
    }

    pub fn exists(&self, txn: &dyn Transaction, account: &Account) -> Result<bool, StoreError> {
        Ok(self.db.get(txn.raw(), account.as_bytes())?.is_some())
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }

    /// Enumerate accounts in key order starting at `start` (inclusive),
    /// up to `limit` entries. Used by the frontier-request server and the
    /// rep-weight rebuild at startup.
    pub fn iter_from(
        &self,
        txn: &dyn Transaction,
        start: Option<&Account>,
        limit: usize,
    ) -> Result<Vec<(Account, AccountInfo)>, StoreError> {
        let mut out = Vec::with_capacity(limit.min(1024));
        let lower: Bound<&[u8]> = match start {
            Some(account) => Bound::Included(account.as_bytes().as_slice()),
            None => Bound::Unbounded,
        };
        let bounds = (lower, Bound::<&[u8]>::Unbounded);
        for result in self.db.range(txn.raw(), &bounds)? {
            if out.len() >= limit {
                break;
            }
            let (key, value) = result?;
            let key: [u8; 32] = key
                .try_into()
                .map_err(|_| StoreError::corrupted("accounts", "key is not 32 bytes"))?;
            let info: AccountInfo = bincode::deserialize(value)
                .map_err(|e| StoreError::corrupted("accounts", e))?;
            out.push((Account::new(key), info));
        }
        Ok(out)
    }
}
