//! Online-weight table — historical samples of observed online stake.
//!
//! Keys are big-endian sample timestamps so iteration is chronological; the
//! trended-stake statistic is computed over these samples.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use strand_types::{Amount, Timestamp};

#[derive(Clone, Copy)]
pub struct OnlineWeightStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl OnlineWeightStore {
    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        at: Timestamp,
        weight: Amount,
    ) -> Result<(), StoreError> {
        self.db.put(
            txn.raw_mut(),
            &at.as_secs().to_be_bytes(),
            &weight.to_be_bytes(),
        )?;
        Ok(())
    }

    /// All samples, oldest first.
    pub fn iter_all(
        &self,
        txn: &dyn Transaction,
    ) -> Result<Vec<(Timestamp, Amount)>, StoreError> {
        let mut out = Vec::new();
        for result in self.db.iter(txn.raw())? {
            let (key, value) = result?;
            let key: [u8; 8] = key
                .try_into()
                .map_err(|_| StoreError::corrupted("online_weight", "key is not 8 bytes"))?;
            let value: [u8; 16] = value
                .try_into()
                .map_err(|_| StoreError::corrupted("online_weight", "value is not 16 bytes"))?;
            out.push((
                Timestamp::new(u64::from_be_bytes(key)),
                Amount::from_be_bytes(value),
            ));
        }
        Ok(out)
    }

    /// Drop samples older than `cutoff`.
    pub fn trim(
        &self,
        txn: &mut WriteTransaction,
        cutoff: Timestamp,
    ) -> Result<usize, StoreError> {
        let stale: Vec<[u8; 8]> = {
            let mut keys = Vec::new();
            for result in self.db.iter(txn.raw())? {
                let (key, _) = result?;
                let key: [u8; 8] = key
                    .try_into()
                    .map_err(|_| StoreError::corrupted("online_weight", "key is not 8 bytes"))?;
                if u64::from_be_bytes(key) < cutoff.as_secs() {
                    keys.push(key);
                }
            }
            keys
        };
        for key in &stale {
            self.db.delete(txn.raw_mut(), key)?;
        }
        Ok(stale.len())
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
