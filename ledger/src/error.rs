//! Ledger errors and the block classification taxonomy.

use serde::{Deserialize, Serialize};
use strand_store::StoreError;
use thiserror::Error;

/// Terminal classification of one `process` call.
///
/// These are outcomes, not errors: the block processor routes on them
/// (drop, defer to unchecked, start an election) rather than propagating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockStatus {
    /// Applied to the ledger.
    Progress,
    /// Already present.
    Old,
    /// A sibling already occupies this position.
    Fork,
    /// `previous` is not in the ledger yet.
    GapPrevious,
    /// The referenced source send is not in the ledger yet.
    GapSource,
    /// Signature does not verify against the derived signer.
    BadSignature,
    /// A send whose balance exceeds the predecessor's.
    NegativeSpend,
    /// Balance delta inconsistent with the pending linkage.
    BalanceMismatch,
    /// No unconsumed pending entry for this receive.
    Unreceivable,
    /// Block form not allowed at this chain position.
    BlockPosition,
    /// Epoch-open for an account with no pending entries.
    GapEpochOpenPending,
    /// Work nonce below the required threshold.
    InsufficientWork,
    /// Attempt to open the burn account.
    OpenedBurnAccount,
    /// Epoch block altering the representative.
    RepresentativeMismatch,
}

impl BlockStatus {
    /// Whether the block may become valid once a dependency arrives.
    pub fn is_gap(&self) -> bool {
        matches!(
            self,
            BlockStatus::GapPrevious | BlockStatus::GapSource | BlockStatus::GapEpochOpenPending
        )
    }
}

/// Hard failures of ledger operations. Store failures are fatal; rollback
/// refusals mean the caller asked for something the invariants forbid.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("block {0} not found")]
    BlockNotFound(String),

    #[error("refusing to roll back cemented block {0}")]
    RollbackCemented(String),

    #[error("refusing to roll back across the pruned boundary at {0}")]
    RollbackPruned(String),

    #[error("corrupted chain state: {0}")]
    Corrupted(String),
}
