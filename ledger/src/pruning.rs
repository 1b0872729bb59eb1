//! Pruning: erase deeply-cemented history, keeping only existence proofs.
//!
//! Pruning removes block bodies, not state: account info, rep weights, and
//! pending entries survive. Every erased hash enters the pruned set so that
//! dependency checks (`block_or_pruned_exists`) keep answering truthfully.

use crate::error::LedgerError;
use crate::ledger::Ledger;
use std::sync::atomic::Ordering;
use strand_store::WriteTransaction;
use strand_types::{Account, BlockHash, Timestamp};

/// Pruner configuration.
#[derive(Clone, Copy, Debug)]
pub struct PruningConfig {
    /// Cemented blocks within this distance of the frontier are kept.
    pub max_depth: u64,
    /// Blocks younger than this many seconds are kept even when deep enough.
    pub min_age_secs: u64,
    /// Blocks erased per transaction; bounds write-lock hold time.
    pub batch_size: u64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            max_depth: 128,
            min_age_secs: 24 * 60 * 60,
            batch_size: 1024,
        }
    }
}

/// Result of one pruning sweep over an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub blocks_pruned: u64,
}

impl Ledger {
    /// Erase blocks walking backward from `hash` (inclusive) until the open
    /// block, an already-pruned ancestor, or `batch_size` is reached.
    /// Returns the number of blocks erased.
    ///
    /// The caller is responsible for choosing `hash` below both the
    /// confirmation height and the retention depth; this primitive refuses
    /// only the hard errors: the frontier itself, an uncemented block, and
    /// the genesis.
    pub fn pruning_action(
        &self,
        txn: &mut WriteTransaction,
        hash: &BlockHash,
        batch_size: u64,
    ) -> Result<u64, LedgerError> {
        let genesis_hash = self.constants.genesis_block.hash();
        let mut pruned = 0u64;
        let mut current = *hash;

        while pruned < batch_size && !current.is_zero() && current != genesis_hash {
            if self.store.pruned.exists(txn, &current)? {
                break;
            }
            let Some(saved) = self.block_get(txn, &current)? else {
                break;
            };
            let account = saved.account();
            let info = self
                .account_info(txn, &account)?
                .ok_or_else(|| LedgerError::Corrupted(format!("missing info for {account}")))?;
            if info.head == current {
                return Err(LedgerError::Corrupted(format!(
                    "refusing to prune frontier block {current}"
                )));
            }
            if !self.block_confirmed(txn, &current)? {
                return Err(LedgerError::Corrupted(format!(
                    "refusing to prune uncemented block {current}"
                )));
            }

            // If the kept predecessor still points at this block, detach it.
            let previous = saved.block.previous();
            if !previous.is_zero() && self.store.block.exists(txn, &previous)? {
                self.set_successor(txn, &previous, BlockHash::ZERO)?;
            }

            self.store.block.del(txn, &current)?;
            self.store.pruned.put(txn, &current)?;
            self.cache.block_count.fetch_sub(1, Ordering::Relaxed);
            self.cache.pruned_count.fetch_add(1, Ordering::Relaxed);
            pruned += 1;
            current = previous;
        }

        if pruned > 0 {
            tracing::debug!(start = %hash, count = pruned, "pruned block bodies");
        }
        Ok(pruned)
    }

    /// Prune one account according to `config`. The newest `max_depth`
    /// cemented blocks and everything uncemented stay; the frontier always
    /// stays.
    pub fn prune_account(
        &self,
        txn: &mut WriteTransaction,
        account: &Account,
        config: &PruningConfig,
        now: Timestamp,
    ) -> Result<PruneStats, LedgerError> {
        if !self.pruning_enabled() {
            return Ok(PruneStats::default());
        }
        let Some(info) = self.account_info(txn, account)? else {
            return Ok(PruneStats::default());
        };
        let confirmed = self.confirmation_height(txn, account)?;
        if confirmed.height <= config.max_depth {
            return Ok(PruneStats::default());
        }
        // Highest height eligible for erasure.
        let prune_to = confirmed.height - config.max_depth;

        // Walk down from the frontier to the boundary block.
        let mut current = info.head;
        let mut saved = loop {
            let Some(saved) = self.block_get(txn, &current)? else {
                return Ok(PruneStats::default());
            };
            if saved.height() <= prune_to {
                break saved;
            }
            current = saved.block.previous();
            if current.is_zero() {
                return Ok(PruneStats::default());
            }
        };

        // Respect the age floor: step down past blocks still too young.
        while saved.sideband.timestamp.elapsed_since(now) < config.min_age_secs {
            let previous = saved.block.previous();
            if previous.is_zero() {
                return Ok(PruneStats::default());
            }
            match self.block_get(txn, &previous)? {
                Some(prev) => saved = prev,
                None => return Ok(PruneStats::default()),
            }
        }

        let blocks_pruned = self.pruning_action(txn, &saved.hash(), config.batch_size)?;
        Ok(PruneStats { blocks_pruned })
    }
}
