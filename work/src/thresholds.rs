//! Epoch- and subtype-aware work thresholds.
//!
//! The threshold is selected from `(work version, epoch, subtype bits)`.
//! From epoch 1 onward, send/change blocks pay the base threshold while
//! receive/open and epoch blocks pay the eased receive threshold; epoch-0
//! chains use the single legacy threshold.

use strand_types::Epoch;

/// Work algorithm version. Only one exists today; the field is carried so a
/// future hash change does not alter stored blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkVersion {
    Work1,
}

/// The threshold-selection context of one block: the epoch it will be part
/// of and its subtype bits, mirroring the sideband's detail flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkContext {
    pub epoch: Epoch,
    pub is_receive: bool,
    pub is_epoch: bool,
}

impl WorkContext {
    pub fn new(epoch: Epoch, is_receive: bool, is_epoch: bool) -> Self {
        Self {
            epoch,
            is_receive,
            is_epoch,
        }
    }
}

const LEGACY_THRESHOLD: u64 = 0xFFFF_FFC0_0000_0000;
const BASE_THRESHOLD: u64 = 0xFFFF_FFF8_0000_0000;
const RECEIVE_THRESHOLD: u64 = 0xFFFF_FE00_0000_0000;

/// Per-network work thresholds.
///
/// Higher values are harder: the nonce's effective difficulty must be ≥ the
/// threshold. `receive` is the easiest, `base` the hardest.
#[derive(Clone, Copy, Debug)]
pub struct WorkThresholds {
    pub legacy: u64,
    pub base: u64,
    pub receive: u64,
}

impl WorkThresholds {
    pub fn mainnet() -> Self {
        Self {
            legacy: LEGACY_THRESHOLD,
            base: BASE_THRESHOLD,
            receive: RECEIVE_THRESHOLD,
        }
    }

    /// Trivial thresholds for unit tests and dev networks.
    pub fn dev() -> Self {
        Self {
            legacy: 0,
            base: 0,
            receive: 0,
        }
    }

    /// Uniform thresholds, useful when a test wants work to matter without
    /// caring about subtype differentiation.
    pub fn uniform(threshold: u64) -> Self {
        Self {
            legacy: threshold,
            base: threshold,
            receive: threshold,
        }
    }

    /// Select the threshold for a block.
    pub fn threshold(&self, version: WorkVersion, ctx: &WorkContext) -> u64 {
        match version {
            WorkVersion::Work1 => match ctx.epoch {
                Epoch::Epoch0 => self.legacy,
                _ => {
                    if ctx.is_receive || ctx.is_epoch {
                        self.receive
                    } else {
                        self.base
                    }
                }
            },
        }
    }

    /// The hardest threshold of this set; wallets use it when the subtype of
    /// a future block is not yet known.
    pub fn max_threshold(&self) -> u64 {
        self.legacy.max(self.base).max(self.receive)
    }

    /// The easiest threshold of this set. Blocks below it are spam under any
    /// interpretation, so ingest paths can reject them before any lookups.
    pub fn min_threshold(&self) -> u64 {
        self.legacy.min(self.base).min(self.receive)
    }
}
