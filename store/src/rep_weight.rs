//! Representation table — persisted rep-weight cache.
//!
//! The authoritative weights are derivable from the account table; this
//! cache lets startup skip the full scan. It is rewritten incrementally by
//! the ledger under the same write transaction as the mutation it reflects.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use strand_types::{Account, Amount};

#[derive(Clone, Copy)]
pub struct RepWeightStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl RepWeightStore {
    pub fn get(
        &self,
        txn: &dyn Transaction,
        representative: &Account,
    ) -> Result<Option<Amount>, StoreError> {
        match self.db.get(txn.raw(), representative.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 16] = bytes.try_into().map_err(|_| {
                    StoreError::corrupted("representation", "value is not 16 bytes")
                })?;
                Ok(Some(Amount::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        representative: &Account,
        weight: Amount,
    ) -> Result<(), StoreError> {
        if weight.is_zero() {
            self.db.delete(txn.raw_mut(), representative.as_bytes())?;
        } else {
            self.db.put(
                txn.raw_mut(),
                representative.as_bytes(),
                &weight.to_be_bytes(),
            )?;
        }
        Ok(())
    }

    /// Full scan, used once at startup to seed the in-memory cache.
    pub fn iter_all(
        &self,
        txn: &dyn Transaction,
    ) -> Result<Vec<(Account, Amount)>, StoreError> {
        let mut out = Vec::new();
        for result in self.db.iter(txn.raw())? {
            let (key, value) = result?;
            let key: [u8; 32] = key
                .try_into()
                .map_err(|_| StoreError::corrupted("representation", "key is not 32 bytes"))?;
            let value: [u8; 16] = value
                .try_into()
                .map_err(|_| StoreError::corrupted("representation", "value is not 16 bytes"))?;
            out.push((Account::new(key), Amount::from_be_bytes(value)));
        }
        Ok(out)
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
