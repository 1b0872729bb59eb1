//! Vote-driven fork resolution.
//!
//! Forks are resolved by open representative voting: each conflict is an
//! election keyed by qualified root, representatives vote by hash, and a
//! candidate confirms when its tally clears the quorum delta derived from
//! trended online stake.

pub mod active_elections;
pub mod election;
pub mod error;
pub mod history;
pub mod online_reps;
pub mod vote;
pub mod vote_cache;

pub use active_elections::{ActiveElections, InsertResult};
pub use election::{Election, ElectionState, ElectionStatus, VoteInfo, VoteResult};
pub use error::{ConsensusError, VoteError};
pub use history::{LocalVoteHistory, VoteGenerator, VoteSpacing};
pub use online_reps::{OnlineReps, OnlineRepsConfig};
pub use vote::{Vote, FINAL_TIMESTAMP, MAX_VOTE_HASHES};
pub use vote_cache::{CachedVote, VoteCache};
