//! Store errors.
//!
//! `Io` and `VersionMismatch` are fatal: the node terminates rather than run
//! against a store it cannot trust. `Corrupted` indicates a value that failed
//! to deserialize — also fatal in practice, but surfaced separately so the
//! operator knows the database itself is damaged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database I/O failure: {0}")]
    Io(String),

    #[error("schema version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("corrupted record in table {table}: {reason}")]
    Corrupted { table: &'static str, reason: String },
}

impl From<heed::Error> for StoreError {
    fn from(err: heed::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl StoreError {
    pub(crate) fn corrupted(table: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Corrupted {
            table,
            reason: err.to_string(),
        }
    }
}
