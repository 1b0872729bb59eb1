//! Observer fan-out for ledger and election events.

use strand_types::{Account, Amount, BlockHash};

/// Structured events observers can subscribe to.
#[derive(Clone, Debug)]
pub enum NodeEvent {
    /// A block reached the ledger (`Progress`).
    BlockProcessed { hash: BlockHash, account: Account },
    /// A block was cemented; fires in commit order.
    BlockConfirmed {
        hash: BlockHash,
        account: Account,
        amount: Option<Amount>,
    },
    /// A fork sibling arrived for an occupied position.
    ForkDetected {
        root_previous: BlockHash,
        incoming: BlockHash,
    },
    /// A valid vote was observed.
    VoteSeen {
        representative: Account,
        hashes: Vec<BlockHash>,
        is_final: bool,
    },
    /// An account balance changed.
    BalanceChanged { account: Account, balance: Amount },
    /// A chain section was rolled back after losing an election.
    RolledBack { count: usize, winner: BlockHash },
}

/// Synchronous fan-out bus. Listeners run inline on the emitting thread;
/// handlers must stay fast to avoid stalling block processing.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&NodeEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&NodeEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &NodeEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
