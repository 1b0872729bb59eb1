//! Consensus errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("active election capacity reached ({0})")]
    ElectionCapacityReached(usize),

    #[error("election not found for root {0}")]
    ElectionNotFound(String),

    #[error("election already confirmed")]
    ElectionAlreadyConfirmed,
}

/// Classification of an incoming vote.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VoteError {
    #[error("vote signature does not verify")]
    BadSignature,

    #[error("vote replays an already-seen timestamp")]
    Replay,

    #[error("vote carries no usable information")]
    Indeterminate,
}
