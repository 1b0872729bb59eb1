//! End-to-end pipeline tests: publish → process → elect → cement.

use std::sync::Arc;
use strand_consensus::Vote;
use strand_crypto::{keypair_from_seed, sign_message};
use strand_ledger::{dev_genesis_key, Block, BlockStatus, LedgerConstants, StateBlock};
use strand_messages::{
    BulkPull, BulkPullAccount, BulkPullAccountFlags, FrontierReq, MessageHeader, NetworkId,
};
use strand_node::{
    bulk_pull, bulk_pull_account, frontier_req, EventBus, Node, NodeConfig,
};
use strand_store::{Store, StoreOptions};
use strand_types::{
    Account, Amount, BlockHash, KeyPair, Link, PendingKey, Root, Signature, Timestamp,
};
use tempfile::TempDir;

struct NodeContext {
    _dir: TempDir,
    node: Node,
}

fn make_node() -> NodeContext {
    make_node_with_config(NodeConfig::dev())
}

fn make_node_with_config(config: NodeConfig) -> NodeContext {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open_with(dir.path(), StoreOptions::dev()).unwrap());
    let node = Node::with_store(
        store,
        LedgerConstants::dev(),
        config,
        EventBus::new(),
        None,
    )
    .unwrap();
    NodeContext { _dir: dir, node }
}

fn key(byte: u8) -> KeyPair {
    keypair_from_seed(&[byte; 32])
}

fn account_of(key: &KeyPair) -> Account {
    Account::from(key.public)
}

fn state_block(
    key: &KeyPair,
    previous: BlockHash,
    representative: Account,
    balance: Amount,
    link: Link,
) -> Block {
    let mut block = Block::State(StateBlock {
        account: account_of(key),
        previous,
        representative,
        balance,
        link,
        signature: Signature::ZERO,
        work: 0,
    });
    let hash = block.hash();
    block.set_signature(sign_message(hash.as_bytes(), &key.private));
    block
}

fn ts(secs: u64) -> Timestamp {
    Timestamp::new(secs)
}

fn header() -> MessageHeader {
    MessageHeader::new(NetworkId::Dev)
}

/// Fund `rep` with `amount` from genesis and cement the whole setup by
/// voting with the rep itself. Returns the new genesis frontier.
fn fund_rep(ctx: &NodeContext, rep_key: &KeyPair, amount: Amount, now: Timestamp) -> BlockHash {
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let rep = account_of(rep_key);

    let (genesis_head, genesis_balance) = {
        let txn = ctx.node.store.tx_begin_read().unwrap();
        let info = ctx.node.ledger.account_info(&txn, &genesis).unwrap().unwrap();
        (info.head, info.balance)
    };

    let send = state_block(
        &genesis_key,
        genesis_head,
        genesis,
        genesis_balance.checked_sub(amount).unwrap(),
        rep.as_link(),
    );
    let open = state_block(rep_key, BlockHash::ZERO, rep, amount, Link::from(send.hash()));

    assert!(ctx.node.on_publish(send.clone()));
    assert!(ctx.node.on_publish(open.clone()));
    ctx.node.flush(now).unwrap();

    // The rep votes its own setup into cement.
    let vote = Vote::new(rep_key, 1, vec![send.hash(), open.hash()]);
    ctx.node.on_vote(&vote, now).unwrap();
    let result = ctx.node.flush(now).unwrap();
    assert!(result.cemented.contains(&send.hash()));
    assert!(result.cemented.contains(&open.hash()));
    send.hash()
}

// ── Scenario: plain processing ───────────────────────────────────────────

#[test]
fn publish_applies_and_republishes() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let genesis_hash = ctx.node.ledger.constants.genesis_block.hash();
    let supply = ctx.node.ledger.constants.genesis_amount;

    let send = state_block(
        &genesis_key,
        genesis_hash,
        genesis,
        supply.checked_sub(Amount::raw(10)).unwrap(),
        account_of(&key(1)).as_link(),
    );
    assert!(ctx.node.on_publish(send.clone()));
    let result = ctx.node.flush(ts(100)).unwrap();

    assert_eq!(result.processed.len(), 1);
    assert_eq!(result.processed[0].status, BlockStatus::Progress);
    assert_eq!(result.republish.len(), 1);
    assert_eq!(result.republish[0].hash(), send.hash());

    let txn = ctx.node.store.tx_begin_read().unwrap();
    assert!(ctx.node.ledger.block_exists(&txn, &send.hash()).unwrap());
}

#[test]
fn duplicate_publish_is_old() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let genesis_hash = ctx.node.ledger.constants.genesis_block.hash();
    let supply = ctx.node.ledger.constants.genesis_amount;

    let send = state_block(
        &genesis_key,
        genesis_hash,
        genesis,
        supply.checked_sub(Amount::raw(10)).unwrap(),
        account_of(&key(1)).as_link(),
    );
    ctx.node.on_publish(send.clone());
    ctx.node.flush(ts(100)).unwrap();
    ctx.node.on_publish(send.clone());
    let result = ctx.node.flush(ts(101)).unwrap();
    assert_eq!(result.processed[0].status, BlockStatus::Old);
    assert!(result.republish.is_empty());
}

// ── Scenario: gap chain ──────────────────────────────────────────────────

#[test]
fn receive_before_send_drains_from_unchecked_in_one_pass() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let genesis_hash = ctx.node.ledger.constants.genesis_block.hash();
    let supply = ctx.node.ledger.constants.genesis_amount;
    let dest_key = key(1);

    let send = state_block(
        &genesis_key,
        genesis_hash,
        genesis,
        supply.checked_sub(Amount::raw(100)).unwrap(),
        account_of(&dest_key).as_link(),
    );
    let receive = state_block(
        &dest_key,
        BlockHash::ZERO,
        account_of(&dest_key),
        Amount::raw(100),
        Link::from(send.hash()),
    );

    // The receive arrives first: parked on the missing send.
    ctx.node.on_publish(receive.clone());
    let result = ctx.node.flush(ts(100)).unwrap();
    assert_eq!(result.processed[0].status, BlockStatus::GapSource);
    assert_eq!(ctx.node.block_processor.unchecked_len(), 1);

    // The send arrives: both apply in the same pipeline pass.
    ctx.node.on_publish(send.clone());
    let result = ctx.node.flush(ts(101)).unwrap();
    let statuses: Vec<BlockStatus> = result.processed.iter().map(|i| i.status).collect();
    assert_eq!(statuses, vec![BlockStatus::Progress, BlockStatus::Progress]);
    assert_eq!(ctx.node.block_processor.unchecked_len(), 0);

    let txn = ctx.node.store.tx_begin_read().unwrap();
    assert!(ctx.node.ledger.block_exists(&txn, &receive.hash()).unwrap());
}

// ── Scenario: fork resolution by vote ────────────────────────────────────

#[test]
fn fork_resolution_rolls_back_loser_and_applies_winner() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let rep_key = key(1);

    let now = ts(100);
    let genesis_head = fund_rep(&ctx, &rep_key, Amount::raw(1_000_000), now);
    let genesis_balance = {
        let txn = ctx.node.store.tx_begin_read().unwrap();
        ctx.node
            .ledger
            .account_info(&txn, &genesis)
            .unwrap()
            .unwrap()
            .balance
    };

    let dest_a = account_of(&key(2));
    let dest_b = account_of(&key(3));
    // The 200-send lands first and is applied; the 100-send arrives as a
    // fork.
    let send_200 = state_block(
        &genesis_key,
        genesis_head,
        genesis,
        genesis_balance.checked_sub(Amount::raw(200)).unwrap(),
        dest_a.as_link(),
    );
    let send_100 = state_block(
        &genesis_key,
        genesis_head,
        genesis,
        genesis_balance.checked_sub(Amount::raw(100)).unwrap(),
        dest_b.as_link(),
    );

    ctx.node.on_publish(send_200.clone());
    ctx.node.flush(now).unwrap();
    ctx.node.on_publish(send_100.clone());
    let result = ctx.node.flush(now).unwrap();
    assert_eq!(result.processed[0].status, BlockStatus::Fork);
    // The applied sibling is re-broadcast as the provisional winner.
    assert_eq!(result.rebroadcast_winners[0].hash(), send_200.hash());

    // Quorum-weight vote lands on the fork.
    let vote = Vote::new(&rep_key, 10, vec![send_100.hash()]);
    ctx.node.on_vote(&vote, now).unwrap();
    let result = ctx.node.flush(now).unwrap();

    let txn = ctx.node.store.tx_begin_read().unwrap();
    assert!(ctx.node.ledger.block_exists(&txn, &send_100.hash()).unwrap());
    assert!(!ctx.node.ledger.block_exists(&txn, &send_200.hash()).unwrap());
    assert!(ctx
        .node
        .ledger
        .pending_info(&txn, &PendingKey::new(dest_b, send_100.hash()))
        .unwrap()
        .is_some());
    assert!(ctx
        .node
        .ledger
        .pending_info(&txn, &PendingKey::new(dest_a, send_200.hash()))
        .unwrap()
        .is_none());
    // The winner cements.
    assert!(result.cemented.contains(&send_100.hash()));
    assert!(ctx
        .node
        .ledger
        .block_confirmed(&txn, &send_100.hash())
        .unwrap());
}

// ── Scenario: vote replay ────────────────────────────────────────────────

#[test]
fn same_timestamp_revote_is_replay() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let rep_key = key(1);
    let now = ts(100);
    let genesis_head = fund_rep(&ctx, &rep_key, Amount::raw(1_000_000), now);
    let genesis_balance = {
        let txn = ctx.node.store.tx_begin_read().unwrap();
        ctx.node
            .ledger
            .account_info(&txn, &genesis)
            .unwrap()
            .unwrap()
            .balance
    };

    let send_a = state_block(
        &genesis_key,
        genesis_head,
        genesis,
        genesis_balance.checked_sub(Amount::raw(200)).unwrap(),
        account_of(&key(2)).as_link(),
    );
    let send_b = state_block(
        &genesis_key,
        genesis_head,
        genesis,
        genesis_balance.checked_sub(Amount::raw(100)).unwrap(),
        account_of(&key(3)).as_link(),
    );
    // Unreachable quorum so the election stays open for tally inspection.
    {
        let mut active = ctx.node.active.lock().unwrap();
        active.set_quorum_delta(u128::MAX);
    }
    ctx.node.on_publish(send_a.clone());
    ctx.node.flush(now).unwrap();
    ctx.node.on_publish(send_b.clone());
    ctx.node.flush(now).unwrap();

    let v1 = Vote::new(&rep_key, 5, vec![send_a.hash()]);
    let dispatch = ctx.node.on_vote(&v1, now).unwrap();
    assert_eq!(dispatch.applied, 1);

    // Same sequence, different hash: dropped as replay, tally unchanged.
    let v2 = Vote::new(&rep_key, 5, vec![send_b.hash()]);
    let result = ctx.node.on_vote(&v2, now);
    assert!(result.is_err());

    let active = ctx.node.active.lock().unwrap();
    let election = active.election_for_hash(&send_a.hash()).unwrap();
    assert_eq!(election.tally_of(&send_a.hash()), 1_000_000);
    assert_eq!(election.tally_of(&send_b.hash()), 0);
}

// ── Scenario: quorum follows trended stake ───────────────────────────────

#[test]
fn quorum_falls_as_trended_stake_decays() {
    let mut config = NodeConfig::dev();
    config.online_weight_minimum = 100;
    let ctx = make_node_with_config(config);
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);

    let small_key = key(1);
    let big_key = key(2);
    let now = ts(100);
    fund_rep(&ctx, &small_key, Amount::raw(500), now);
    let genesis_head = fund_rep(&ctx, &big_key, Amount::raw(100_000), now);

    // Both reps online: trended stake is high, quorum out of the small
    // rep's reach.
    ctx.node.sample_online_weight(now).unwrap();
    let high_delta = ctx.node.active.lock().unwrap().quorum_delta();
    assert!(high_delta > 500);

    let genesis_balance = {
        let txn = ctx.node.store.tx_begin_read().unwrap();
        ctx.node
            .ledger
            .account_info(&txn, &genesis)
            .unwrap()
            .unwrap()
            .balance
    };
    let send = state_block(
        &genesis_key,
        genesis_head,
        genesis,
        genesis_balance.checked_sub(Amount::raw(1)).unwrap(),
        account_of(&key(9)).as_link(),
    );
    ctx.node.on_publish(send.clone());
    ctx.node.flush(now).unwrap();

    let vote = Vote::new(&small_key, 50, vec![send.hash()]);
    let dispatch = ctx.node.on_vote(&vote, now).unwrap();
    assert!(dispatch.confirmed.is_empty());

    // The big rep goes silent; samples past the window decay the trend
    // until quorum drops below the small rep's weight. The keepalive votes
    // reference an unrelated hash so the open election is untouched while
    // the small rep stays counted as online.
    for i in 1..=8 {
        let later = ts(100 + i * 400);
        let keepalive = Vote::new(&small_key, 50 + i, vec![BlockHash::new([0xEE; 32])]);
        let _ = ctx.node.on_vote(&keepalive, later);
        ctx.node.sample_online_weight(later).unwrap();
    }
    let low_delta = ctx.node.active.lock().unwrap().quorum_delta();
    assert!(low_delta <= 500, "quorum {low_delta} should have decayed");

    // The next vote confirms under the decayed quorum.
    let final_vote = Vote::new(&small_key, 100, vec![send.hash()]);
    let dispatch = ctx.node.on_vote(&final_vote, ts(100 + 9 * 400)).unwrap();
    assert_eq!(dispatch.confirmed.len(), 1);
}

// ── Backpressure ─────────────────────────────────────────────────────────

#[test]
fn live_queue_refuses_when_full() {
    let mut config = NodeConfig::dev();
    config.block_queue_max = 2;
    let ctx = make_node_with_config(config);
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let supply = ctx.node.ledger.constants.genesis_amount;

    for i in 0..2u8 {
        let block = state_block(
            &genesis_key,
            BlockHash::new([i + 1; 32]),
            genesis,
            supply,
            Link::ZERO,
        );
        assert!(ctx.node.on_publish(block));
    }
    assert!(ctx.node.block_processor.full());
    let extra = state_block(&genesis_key, BlockHash::new([9; 32]), genesis, supply, Link::ZERO);
    assert!(!ctx.node.on_publish(extra.clone()));
    // Local submissions bypass backpressure.
    ctx.node.on_local_block(extra);
    assert_eq!(ctx.node.block_processor.queue_len(), 3);
}

// ── Bootstrap handlers ───────────────────────────────────────────────────

#[test]
fn bulk_pull_walks_chain_newest_first() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let genesis_hash = ctx.node.ledger.constants.genesis_block.hash();
    let supply = ctx.node.ledger.constants.genesis_amount;

    let send1 = state_block(
        &genesis_key,
        genesis_hash,
        genesis,
        supply.checked_sub(Amount::raw(1)).unwrap(),
        account_of(&key(1)).as_link(),
    );
    let send2 = state_block(
        &genesis_key,
        send1.hash(),
        genesis,
        supply.checked_sub(Amount::raw(2)).unwrap(),
        account_of(&key(1)).as_link(),
    );
    ctx.node.on_publish(send1.clone());
    ctx.node.on_publish(send2.clone());
    ctx.node.flush(ts(100)).unwrap();

    let txn = ctx.node.store.tx_begin_read().unwrap();
    // Pull by account: full chain newest first.
    let request = BulkPull {
        header: header(),
        start: Root::from(genesis),
        end: BlockHash::ZERO,
        count: None,
    };
    let blocks = bulk_pull(&ctx.node.ledger, &txn, &request).unwrap();
    let hashes: Vec<BlockHash> = blocks.iter().map(|b| b.hash()).collect();
    assert_eq!(hashes, vec![send2.hash(), send1.hash(), genesis_hash]);

    // Pull by hash with an end bound.
    let request = BulkPull {
        header: header(),
        start: Root::from(send2.hash()),
        end: genesis_hash,
        count: None,
    };
    let blocks = bulk_pull(&ctx.node.ledger, &txn, &request).unwrap();
    assert_eq!(blocks.len(), 2);

    // Count cap.
    let request = BulkPull {
        header: header(),
        start: Root::from(genesis),
        end: BlockHash::ZERO,
        count: Some(1),
    };
    assert_eq!(bulk_pull(&ctx.node.ledger, &txn, &request).unwrap().len(), 1);
}

#[test]
fn frontier_req_filters_by_confirmation() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let genesis_hash = ctx.node.ledger.constants.genesis_block.hash();
    let supply = ctx.node.ledger.constants.genesis_amount;

    let send = state_block(
        &genesis_key,
        genesis_hash,
        genesis,
        supply.checked_sub(Amount::raw(1)).unwrap(),
        account_of(&key(1)).as_link(),
    );
    ctx.node.on_publish(send.clone());
    ctx.node.flush(ts(100)).unwrap();

    let txn = ctx.node.store.tx_begin_read().unwrap();
    let all = frontier_req(
        &ctx.node.ledger,
        &txn,
        &FrontierReq {
            header: header(),
            start: Account::ZERO,
            age_secs: u64::MAX,
            count: 100,
            only_confirmed: false,
        },
        ts(101),
    )
    .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].frontier, send.hash());

    // Confirmed view still reports the genesis block as frontier.
    let confirmed = frontier_req(
        &ctx.node.ledger,
        &txn,
        &FrontierReq {
            header: header(),
            start: Account::ZERO,
            age_secs: u64::MAX,
            count: 100,
            only_confirmed: true,
        },
        ts(101),
    )
    .unwrap();
    assert_eq!(confirmed[0].frontier, genesis_hash);
}

#[test]
fn bulk_pull_account_filters_and_deduplicates() {
    let ctx = make_node();
    let genesis_key = dev_genesis_key();
    let genesis = account_of(&genesis_key);
    let genesis_hash = ctx.node.ledger.constants.genesis_block.hash();
    let supply = ctx.node.ledger.constants.genesis_amount;
    let dest = account_of(&key(1));

    let send_small = state_block(
        &genesis_key,
        genesis_hash,
        genesis,
        supply.checked_sub(Amount::raw(5)).unwrap(),
        dest.as_link(),
    );
    let send_big = state_block(
        &genesis_key,
        send_small.hash(),
        genesis,
        supply.checked_sub(Amount::raw(105)).unwrap(),
        dest.as_link(),
    );
    ctx.node.on_publish(send_small.clone());
    ctx.node.on_publish(send_big.clone());
    ctx.node.flush(ts(100)).unwrap();

    let txn = ctx.node.store.tx_begin_read().unwrap();
    let response = bulk_pull_account(
        &ctx.node.ledger,
        &txn,
        &BulkPullAccount {
            header: header(),
            account: dest,
            minimum_amount: Amount::raw(50),
            flags: BulkPullAccountFlags::PendingHashAndAmount,
        },
    )
    .unwrap();
    // Only the 100-raw send clears the minimum.
    assert_eq!(response.entries.len(), 1);
    assert_eq!(response.entries[0].hash, send_big.hash());
    assert_eq!(response.entries[0].amount, Amount::raw(100));

    let sources = bulk_pull_account(
        &ctx.node.ledger,
        &txn,
        &BulkPullAccount {
            header: header(),
            account: dest,
            minimum_amount: Amount::ZERO,
            flags: BulkPullAccountFlags::PendingAddressOnly,
        },
    )
    .unwrap();
    // Two pendings, one distinct source.
    assert_eq!(sources.entries.len(), 1);
    assert_eq!(sources.entries[0].source, genesis);
}
