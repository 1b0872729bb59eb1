//! Work subsystem errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkError {
    #[error("work difficulty {difficulty:#018x} below threshold {threshold:#018x}")]
    Insufficient { difficulty: u64, threshold: u64 },

    #[error("work generation cancelled")]
    Cancelled,
}
