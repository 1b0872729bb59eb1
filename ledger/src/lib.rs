//! Block-lattice ledger state machine.
//!
//! Each account owns a singly-linked chain of blocks; consensus is only
//! needed where two blocks contest the same position. This crate is the pure
//! state machine: given a transaction and a candidate block it classifies
//! and applies it, answers queries, inverts applies on rollback, and erases
//! deeply-cemented history.

pub mod block;
pub mod epochs;
pub mod error;
pub mod genesis;
pub mod ledger;
pub mod processor;
pub mod pruning;
pub mod rep_weights;
pub mod rollback;

pub use block::{
    Block, BlockDetails, BlockKind, ChangeBlock, OpenBlock, ReceiveBlock, SavedBlock, SendBlock,
    Sideband, StateBlock,
};
pub use epochs::Epochs;
pub use error::{BlockStatus, LedgerError};
pub use genesis::{dev_genesis_key, LedgerConstants};
pub use ledger::{Ledger, LedgerCache};
pub use pruning::{PruneStats, PruningConfig};
pub use rep_weights::RepWeights;
