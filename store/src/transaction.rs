//! Transaction wrappers over LMDB.
//!
//! A write transaction serializes with all other writers; concurrent readers
//! see the pre-write snapshot (LMDB MVCC). Cursors and borrowed values are
//! valid only within their transaction.

use crate::error::StoreError;
use heed::{RoTxn, RwTxn};

/// Read access to the store. Implemented by both transaction kinds so query
/// code can run inside either.
pub trait Transaction {
    fn raw(&self) -> &RoTxn<'_>;
}

/// A snapshot-read transaction.
pub struct ReadTransaction<'env> {
    pub(crate) txn: RoTxn<'env>,
}

impl Transaction for ReadTransaction<'_> {
    fn raw(&self) -> &RoTxn<'_> {
        &self.txn
    }
}

/// The single-writer transaction. Dropping without `commit` aborts.
pub struct WriteTransaction<'env> {
    pub(crate) txn: RwTxn<'env>,
}

impl<'env> WriteTransaction<'env> {
    pub(crate) fn raw_mut(&mut self) -> &mut RwTxn<'env> {
        &mut self.txn
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit()?;
        Ok(())
    }

    pub fn abort(self) {
        self.txn.abort();
    }
}

impl Transaction for WriteTransaction<'_> {
    fn raw(&self) -> &RoTxn<'_> {
        &self.txn
    }
}
