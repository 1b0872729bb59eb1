//! Errors raised when decoding the fundamental types.

use thiserror::Error;

/// Decoding/parsing errors for the fundamental types.
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown epoch number: {0}")]
    UnknownEpoch(u8),
}
