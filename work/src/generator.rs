//! Wallet-side nonce search.
//!
//! Generation runs on the rayon pool, each worker probing a disjoint stripe
//! of the nonce space. A cancellation races with completion; whichever lands
//! first wins and the losers stop at their next probe batch.

use crate::error::WorkError;
use crate::thresholds::WorkVersion;
use crate::validator::work_difficulty;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use strand_types::Root;

/// Nonces checked between cancellation probes.
const PROBE_INTERVAL: u64 = 4096;

/// Shared cancellation flag for an in-flight generation request.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// CPU work generator.
pub struct WorkGenerator {
    stripes: u64,
}

impl WorkGenerator {
    pub fn new() -> Self {
        Self {
            stripes: rayon::current_num_threads().max(1) as u64,
        }
    }

    /// Search for a nonce whose difficulty clears `threshold`.
    ///
    /// Returns `WorkError::Cancelled` if the token fires before a nonce is
    /// found. The nonce space is astronomically larger than any realistic
    /// threshold gap, so exhaustion is not a practical outcome; a full wrap
    /// of a stripe without a hit also reports `Cancelled`.
    pub fn generate(
        &self,
        version: WorkVersion,
        root: &Root,
        threshold: u64,
        cancel: &CancelToken,
    ) -> Result<u64, WorkError> {
        let found = AtomicBool::new(false);
        let winner = AtomicU64::new(0);
        let stripe_len = u64::MAX / self.stripes;

        (0..self.stripes).into_par_iter().for_each(|stripe| {
            let mut nonce = stripe.wrapping_mul(stripe_len);
            let end = nonce.wrapping_add(stripe_len);
            let mut since_probe = PROBE_INTERVAL;
            while nonce != end {
                if since_probe >= PROBE_INTERVAL {
                    since_probe = 0;
                    if found.load(Ordering::Relaxed) || cancel.is_cancelled() {
                        return;
                    }
                }
                since_probe += 1;
                if work_difficulty(version, root, nonce) >= threshold {
                    if !found.swap(true, Ordering::Relaxed) {
                        winner.store(nonce, Ordering::Relaxed);
                    }
                    return;
                }
                nonce = nonce.wrapping_add(1);
            }
        });

        if found.load(Ordering::Relaxed) {
            Ok(winner.load(Ordering::Relaxed))
        } else {
            Err(WorkError::Cancelled)
        }
    }
}

impl Default for WorkGenerator {
    fn default() -> Self {
        Self::new()
    }
}
