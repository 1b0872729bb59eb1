//! Node-level errors.

use strand_ledger::LedgerError;
use strand_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("node is shutting down")]
    ShuttingDown,
}
