//! Anti-spam proof-of-work for the strand ledger.
//!
//! Every block carries a 64-bit nonce whose Blake2b digest against the block
//! root must clear a threshold. The threshold depends on the account's epoch
//! and the block subtype: receives and epoch upgrades are cheaper than sends
//! so that draining spam is costlier than absorbing it.

pub mod error;
pub mod generator;
pub mod thresholds;
pub mod validator;

pub use error::WorkError;
pub use generator::{CancelToken, WorkGenerator};
pub use thresholds::{WorkContext, WorkThresholds, WorkVersion};
pub use validator::{work_difficulty, validate_work};
