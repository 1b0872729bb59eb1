//! Schema version record.

use crate::error::StoreError;
use crate::transaction::{Transaction, WriteTransaction};
use heed::types::Bytes;
use heed::Database;

/// Current schema version. Bumped on any change to table layouts or value
/// encodings.
pub const SCHEMA_VERSION: u32 = 1;

const VERSION_KEY: &[u8] = b"schema_version";

#[derive(Clone, Copy)]
pub struct VersionStore {
    pub(crate) db: Database<Bytes, Bytes>,
}

impl VersionStore {
    pub fn get(&self, txn: &dyn Transaction) -> Result<Option<u32>, StoreError> {
        match self.db.get(txn.raw(), VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes
                    .try_into()
                    .map_err(|_| StoreError::corrupted("version", "value is not 4 bytes"))?;
                Ok(Some(u32::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn put(&self, txn: &mut WriteTransaction, version: u32) -> Result<(), StoreError> {
        self.db
            .put(txn.raw_mut(), VERSION_KEY, &version.to_be_bytes())?;
        Ok(())
    }
}
