//! In-memory representative weight cache.
//!
//! Updated by the ledger under the write lock on every mutation and mirrored
//! to the `representation` table in the same transaction; reads are lock-free
//! for everyone else. Rebuilt from the table once at startup.

use std::collections::HashMap;
use std::sync::RwLock;
use strand_types::{Account, Amount};

#[derive(Default)]
pub struct RepWeights {
    weights: RwLock<HashMap<Account, u128>>,
}

impl RepWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, representative: &Account) -> Amount {
        let weights = self.weights.read().expect("rep weight lock poisoned");
        Amount::raw(weights.get(representative).copied().unwrap_or(0))
    }

    pub fn add(&self, representative: &Account, amount: Amount) {
        if amount.is_zero() || representative.is_zero() {
            return;
        }
        let mut weights = self.weights.write().expect("rep weight lock poisoned");
        let entry = weights.entry(*representative).or_insert(0);
        *entry = entry.saturating_add(amount.value());
    }

    pub fn sub(&self, representative: &Account, amount: Amount) {
        if amount.is_zero() || representative.is_zero() {
            return;
        }
        let mut weights = self.weights.write().expect("rep weight lock poisoned");
        if let Some(entry) = weights.get_mut(representative) {
            *entry = entry.saturating_sub(amount.value());
            if *entry == 0 {
                weights.remove(representative);
            }
        }
    }

    /// Move `from`'s old stake to `to`'s new stake in one step. The amounts
    /// differ when the same block also sends or receives.
    pub fn transfer(&self, from: &Account, old_amount: Amount, to: &Account, new_amount: Amount) {
        self.sub(from, old_amount);
        self.add(to, new_amount);
    }

    pub fn all(&self) -> HashMap<Account, u128> {
        self.weights
            .read()
            .expect("rep weight lock poisoned")
            .clone()
    }

    pub fn total(&self) -> Amount {
        let weights = self.weights.read().expect("rep weight lock poisoned");
        Amount::raw(weights.values().fold(0u128, |acc, w| acc.saturating_add(*w)))
    }

    pub fn rebuild(&self, entries: impl Iterator<Item = (Account, Amount)>) {
        let mut weights = self.weights.write().expect("rep weight lock poisoned");
        weights.clear();
        for (rep, amount) in entries {
            if !amount.is_zero() {
                weights.insert(rep, amount.value());
            }
        }
    }
}
