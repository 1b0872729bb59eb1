//! Node configuration.

use serde::{Deserialize, Serialize};
use strand_consensus::OnlineRepsConfig;
use strand_ledger::PruningConfig;

/// Tunables for the block-processing core. Defaults match a small live
/// deployment; tests shrink the bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Blocks held across the processor's input queues before backpressure.
    pub block_queue_max: usize,
    /// Blocks drained per processing batch.
    pub batch_size: usize,
    /// Entries held in the unchecked buffer before oldest-first eviction.
    pub unchecked_max: usize,
    /// Concurrent elections.
    pub active_elections_max: usize,
    /// Election time budget before expiry, seconds.
    pub election_timeout_secs: u64,
    /// Confirmed hashes queued for cementing before backpressure.
    pub cementer_queue_max: usize,
    /// Blocks cemented per write batch.
    pub cementer_batch_size: usize,
    /// Recently-cemented ring size, for observers and RPC.
    pub recently_cemented_max: usize,
    /// Online-stake sampling and quorum parameters.
    pub online_weight_window_secs: u64,
    pub online_weight_minimum: u128,
    pub quorum_fraction_ppt: u128,
    pub principal_threshold_ppm: u128,
    /// Pruning; disabled unless enabled explicitly.
    pub pruning_enabled: bool,
    pub pruning_max_depth: u64,
    pub pruning_min_age_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            block_queue_max: 8192,
            batch_size: 256,
            unchecked_max: 65_536,
            active_elections_max: 5000,
            election_timeout_secs: 300,
            cementer_queue_max: 16_384,
            cementer_batch_size: 2048,
            recently_cemented_max: 65_536,
            online_weight_window_secs: 5 * 60,
            online_weight_minimum: 60_000_000,
            quorum_fraction_ppt: 670,
            principal_threshold_ppm: 1_000,
            pruning_enabled: false,
            pruning_max_depth: 128,
            pruning_min_age_secs: 24 * 60 * 60,
        }
    }
}

impl NodeConfig {
    pub fn online_reps(&self) -> OnlineRepsConfig {
        OnlineRepsConfig {
            window_secs: self.online_weight_window_secs,
            online_weight_minimum: self.online_weight_minimum,
            quorum_fraction_ppt: self.quorum_fraction_ppt,
            principal_threshold_ppm: self.principal_threshold_ppm,
        }
    }

    pub fn pruning(&self) -> PruningConfig {
        PruningConfig {
            max_depth: self.pruning_max_depth,
            min_age_secs: self.pruning_min_age_secs,
            batch_size: 1024,
        }
    }

    /// Tight bounds for unit tests.
    pub fn dev() -> Self {
        Self {
            block_queue_max: 64,
            batch_size: 16,
            unchecked_max: 16,
            active_elections_max: 16,
            election_timeout_secs: 30,
            cementer_queue_max: 64,
            cementer_batch_size: 64,
            recently_cemented_max: 64,
            online_weight_minimum: 1000,
            ..Self::default()
        }
    }
}
