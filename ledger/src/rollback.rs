//! Rollback: remove a block and everything above it, inverting each apply.
//!
//! Blocks pop head-first so every removal happens at a frontier. A send whose
//! pending entry was already consumed forces the receiving chain to roll back
//! first, exactly undoing the cross-account dependency. Cemented blocks and
//! pruned history refuse.

use crate::block::{Block, SavedBlock};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use std::sync::atomic::Ordering;
use strand_store::{AccountInfo, WriteTransaction};
use strand_types::{Account, Amount, BlockHash, PendingInfo, PendingKey, Timestamp};

/// Backstop against cycles in corrupted chain state.
const MAX_ROLLBACK_DEPTH: usize = 128 * 1024;

impl Ledger {
    /// Roll back `target` and all blocks above it on its chain (plus any
    /// dependent receives on other chains). Returns the removed blocks in
    /// pop order: newest first, `target` last.
    pub fn rollback(
        &self,
        txn: &mut WriteTransaction,
        target: &BlockHash,
    ) -> Result<Vec<SavedBlock>, LedgerError> {
        if !self.store.block.exists(txn, target)? {
            if self.store.pruned.exists(txn, target)? {
                return Err(LedgerError::RollbackPruned(target.to_string()));
            }
            return Err(LedgerError::BlockNotFound(target.to_string()));
        }

        let mut rolled_back = Vec::new();
        while self.store.block.exists(txn, target)? {
            if rolled_back.len() >= MAX_ROLLBACK_DEPTH {
                return Err(LedgerError::Corrupted(format!(
                    "rollback of {target} exceeded depth limit"
                )));
            }
            let account = self
                .account_of(txn, target)?
                .ok_or_else(|| LedgerError::Corrupted(format!("block {target} has no account")))?;
            let info = self
                .account_info(txn, &account)?
                .ok_or_else(|| LedgerError::Corrupted(format!("missing info for {account}")))?;
            self.pop_head(txn, &account, &info, &mut rolled_back)?;
        }
        Ok(rolled_back)
    }

    /// Remove the frontier block of `account`, inverting its effects.
    fn pop_head(
        &self,
        txn: &mut WriteTransaction,
        account: &Account,
        info: &AccountInfo,
        rolled_back: &mut Vec<SavedBlock>,
    ) -> Result<(), LedgerError> {
        let head_hash = info.head;
        let saved = self
            .block_get(txn, &head_hash)?
            .ok_or_else(|| LedgerError::Corrupted(format!("missing head block {head_hash}")))?;

        let confirmed = self.confirmation_height(txn, account)?.height;
        if saved.height() <= confirmed {
            return Err(LedgerError::RollbackCemented(head_hash.to_string()));
        }

        let previous_hash = saved.block.previous();
        let previous = if previous_hash.is_zero() {
            None
        } else {
            let prev = self.block_get(txn, &previous_hash)?;
            if prev.is_none() {
                // The predecessor was erased under this block.
                return Err(LedgerError::RollbackPruned(previous_hash.to_string()));
            }
            prev
        };
        let prev_balance = previous.as_ref().map(|p| p.balance()).unwrap_or(Amount::ZERO);

        // Invert the pending flip.
        if saved.sideband.details.is_send {
            let destination = match &saved.block {
                Block::Send(b) => b.destination,
                Block::State(b) => b.link.as_account(),
                _ => {
                    return Err(LedgerError::Corrupted(format!(
                        "send sideband on non-send block {head_hash}"
                    )))
                }
            };
            let key = PendingKey::new(destination, head_hash);
            if self.store.pending.get(txn, &key)?.is_none() {
                // Already received: unwind the receiving chain first, which
                // recreates the entry, then continue popping this one.
                let receive = self
                    .find_receive_for_send(txn, &destination, &head_hash)?
                    .ok_or_else(|| {
                        LedgerError::Corrupted(format!(
                            "pending entry for send {head_hash} consumed but no receive found"
                        ))
                    })?;
                let mut dependent = self.rollback(txn, &receive.hash())?;
                rolled_back.append(&mut dependent);
            }
            self.store.pending.del(txn, &key)?;
        } else if saved.sideband.details.is_receive {
            let source = match &saved.block {
                Block::Open(b) => b.source,
                Block::Receive(b) => b.source,
                Block::State(b) => b.link.as_block_hash(),
                _ => {
                    return Err(LedgerError::Corrupted(format!(
                        "receive sideband on non-receive block {head_hash}"
                    )))
                }
            };
            let amount = saved
                .balance()
                .checked_sub(prev_balance)
                .ok_or_else(|| LedgerError::Corrupted("receive below previous balance".into()))?;
            // The source account is unknowable if the source was pruned; the
            // recreated entry then carries a zero source, which does not
            // affect ledger correctness.
            let source_account = self.account_of(txn, &source)?.unwrap_or(Account::ZERO);
            self.store.pending.put(
                txn,
                &PendingKey::new(*account, source),
                &PendingInfo::new(source_account, amount, saved.sideband.source_epoch),
            )?;
        }

        // Invert the rep-weight delta.
        let current_rep = info.representative;
        let previous_rep = match &previous {
            Some(prev) => self
                .representative_of(txn, &prev.hash())?
                .unwrap_or(current_rep),
            None => Account::ZERO,
        };
        match &previous {
            Some(_) => {
                self.rep_weights
                    .transfer(&current_rep, saved.balance(), &previous_rep, prev_balance);
                self.store_rep_weight(txn, &previous_rep)?;
            }
            None => self.rep_weights.sub(&current_rep, saved.balance()),
        }
        self.store_rep_weight(txn, &current_rep)?;

        // Restore account info and frontier.
        self.store.frontier.del(txn, &head_hash)?;
        match &previous {
            Some(prev) => {
                // The previous block's detail epoch is the account's upgrade
                // level at that height.
                self.store.account.put(
                    txn,
                    account,
                    &AccountInfo {
                        head: previous_hash,
                        open_block: info.open_block,
                        balance: prev_balance,
                        modified: Timestamp::now(),
                        block_count: info.block_count - 1,
                        representative: previous_rep,
                        epoch: prev.sideband.details.epoch,
                    },
                )?;
                self.store.frontier.put(txn, &previous_hash, account)?;
                self.set_successor(txn, &previous_hash, BlockHash::ZERO)?;
            }
            None => {
                self.store.account.del(txn, account)?;
                self.cache.account_count.fetch_sub(1, Ordering::Relaxed);
            }
        }

        self.store.block.del(txn, &head_hash)?;
        self.cache.block_count.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(block = %head_hash, %account, "rolled back block");
        rolled_back.push(saved);
        Ok(())
    }
}
