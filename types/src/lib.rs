//! Fundamental types for the strand ledger.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: accounts, hashes, amounts, keys, epochs, pending entries, and
//! timestamps.

pub mod account;
pub mod amount;
pub mod epoch;
pub mod error;
pub mod hash;
pub mod keys;
pub mod pending;
pub mod time;

pub use account::Account;
pub use amount::Amount;
pub use epoch::Epoch;
pub use error::TypeError;
pub use hash::{BlockHash, Link, QualifiedRoot, Root};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use pending::{PendingInfo, PendingKey};
pub use time::Timestamp;
