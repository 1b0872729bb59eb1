//! Server side of the bootstrap pulls.
//!
//! Every handler operates through ledger queries under one read snapshot;
//! nothing here touches the write path.

use strand_ledger::{Block, Ledger, LedgerError};
use strand_messages::{BulkPull, BulkPullAccount, BulkPullAccountFlags, FrontierEntry, FrontierReq, PendingEntry};
use strand_store::Transaction;
use strand_types::{Account, Amount, BlockHash, Timestamp};

/// Hard ceiling on blocks served per pull, on top of the client's count.
const MAX_BULK_PULL_BLOCKS: usize = 65_536;

/// Response to a `BulkPullAccount` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkPullAccountResponse {
    pub frontier: BlockHash,
    pub balance: Amount,
    pub entries: Vec<PendingEntry>,
}

/// Serve `bulk_pull`: blocks from `start` back toward `end`, newest first.
///
/// `start` is either a block hash or an account (whose frontier is the
/// start). The walk stops at `end`, the account origin, a pruned ancestor,
/// or the count cap.
pub fn bulk_pull(
    ledger: &Ledger,
    txn: &dyn Transaction,
    request: &BulkPull,
) -> Result<Vec<Block>, LedgerError> {
    let start_hash = BlockHash::new(*request.start.as_bytes());
    let mut current = if ledger.block_exists(txn, &start_hash)? {
        start_hash
    } else {
        // Interpret the start as an account.
        let account = Account::new(*request.start.as_bytes());
        match ledger.latest(txn, &account)? {
            Some(frontier) => frontier,
            None => return Ok(Vec::new()),
        }
    };

    let cap = request
        .count
        .map(|count| count as usize)
        .unwrap_or(MAX_BULK_PULL_BLOCKS)
        .min(MAX_BULK_PULL_BLOCKS);

    let mut blocks = Vec::new();
    while blocks.len() < cap && current != request.end && !current.is_zero() {
        let Some(saved) = ledger.block_get(txn, &current)? else {
            break;
        };
        current = saved.block.previous();
        blocks.push(saved.block);
    }
    Ok(blocks)
}

/// Serve `frontier_req`: `(account, frontier)` pairs in account order.
pub fn frontier_req(
    ledger: &Ledger,
    txn: &dyn Transaction,
    request: &FrontierReq,
    now: Timestamp,
) -> Result<Vec<FrontierEntry>, LedgerError> {
    let accounts = ledger.store.account.iter_from(
        txn,
        Some(&request.start),
        request.count as usize,
    )?;
    let mut entries = Vec::with_capacity(accounts.len());
    for (account, info) in accounts {
        if request.age_secs != u64::MAX && info.modified.elapsed_since(now) > request.age_secs {
            continue;
        }
        let frontier = if request.only_confirmed {
            let confirmed = ledger.confirmation_height(txn, &account)?;
            if confirmed.height == 0 {
                continue;
            }
            confirmed.frontier
        } else {
            info.head
        };
        entries.push(FrontierEntry { account, frontier });
    }
    Ok(entries)
}

/// Serve `bulk_pull_account`: the account's pending entries at or above the
/// minimum amount, or just the distinct source addresses.
pub fn bulk_pull_account(
    ledger: &Ledger,
    txn: &dyn Transaction,
    request: &BulkPullAccount,
) -> Result<BulkPullAccountResponse, LedgerError> {
    let (frontier, balance) = match ledger.account_info(txn, &request.account)? {
        Some(info) => (info.head, info.balance),
        None => (BlockHash::ZERO, Amount::ZERO),
    };

    let pending = ledger.account_receivable(
        txn,
        &request.account,
        request.minimum_amount,
        usize::MAX,
    )?;

    let entries = match request.flags {
        BulkPullAccountFlags::PendingHashAndAmount => pending
            .into_iter()
            .map(|(key, info)| PendingEntry {
                hash: key.send_hash,
                amount: info.amount,
                source: info.source,
            })
            .collect(),
        BulkPullAccountFlags::PendingAddressOnly => {
            let mut seen = std::collections::HashSet::new();
            pending
                .into_iter()
                .filter(|(_, info)| seen.insert(info.source))
                .map(|(_, info)| PendingEntry {
                    hash: BlockHash::ZERO,
                    amount: Amount::ZERO,
                    source: info.source,
                })
                .collect()
        }
    };

    Ok(BulkPullAccountResponse {
        frontier,
        balance,
        entries,
    })
}
