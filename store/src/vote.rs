//! Vote table — highest-timestamp vote observed per representative.
//!
//! Values are the wire encoding of the vote; the consensus crate owns the
//! format. Persisting the latest vote lets replay protection survive a
//! restart.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;
use strand_types::Account;

#[derive(Clone, Copy)]
pub struct VoteStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl VoteStore {
    pub fn put(
        &self,
        txn: &mut WriteTransaction,
        representative: &Account,
        vote_bytes: &[u8],
    ) -> Result<(), StoreError> {
        self.db
            .put(txn.raw_mut(), representative.as_bytes(), vote_bytes)?;
        Ok(())
    }

    pub fn get(
        &self,
        txn: &dyn Transaction,
        representative: &Account,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .db
            .get(txn.raw(), representative.as_bytes())?
            .map(|b| b.to_vec()))
    }

    pub fn count(&self, txn: &dyn Transaction) -> Result<u64, StoreError> {
        Ok(self.db.len(txn.raw())?)
    }
}
