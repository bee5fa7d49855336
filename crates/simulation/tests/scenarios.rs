//! End-to-end scenarios exercising mining, gossip, forks, and termination.

use powmesh_core::Event;
use powmesh_simulation::{SimulationRunner, StopReason};
use powmesh_types::{Block, SimConfig, Transaction, TxId};
use std::sync::Arc;
use std::time::Duration;

/// Post-run structural invariants that must hold on every node.
fn assert_invariants(runner: &SimulationRunner) {
    let genesis = runner.genesis_hash();
    let mut orphans_received = 0;
    let mut orphans_processed = 0;

    for node in runner.nodes() {
        let tip_work = node.chain_work(&node.best_tip()).expect("tip has work");

        for hash in node.block_hashes() {
            let work = node.chain_work(hash).expect("validated block has work");
            assert!(tip_work >= work, "best tip must carry maximal work");

            if *hash == genesis {
                assert_eq!(work, 0);
                continue;
            }
            let block = node.block(hash).unwrap();
            let parent_work = node
                .chain_work(&block.header.prev_hash)
                .expect("parent of a validated block is validated");
            assert_eq!(work, parent_work + 1, "work increments along the chain");
        }

        // A mempool transaction never sits in a best-path block.
        let mut cursor = node.best_tip();
        while cursor != genesis {
            let block = node.block(&cursor).unwrap().clone();
            for tx in &block.transactions {
                assert!(
                    !node.mempool_contains(&tx.id),
                    "node {}: tx {} is both pooled and on the best path",
                    node.index(),
                    tx.id
                );
            }
            cursor = block.header.prev_hash;
        }

        orphans_received += node.stats.received_orphans;
        orphans_processed += node.stats.processed_orphans;
    }

    assert!(
        orphans_received >= orphans_processed,
        "cannot replay more orphans than were parked"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario: single miner, low rate
// ═══════════════════════════════════════════════════════════════════════════

/// One miner, one transaction per block, zero delays: the chain grows and
/// every node converges on the same tip with no stale blocks.
#[test]
fn test_single_miner_converges() {
    let config = SimConfig {
        num_nodes: 3,
        num_miners: 1,
        block_size_limit_bytes: 300,
        tx_rate_per_sec: 1.0,
        min_tx_size_bytes: 100,
        max_tx_size_bytes: 600,
        mean_tx_size_bytes: 300.0,
        stddev_tx_size_bytes: 0.0,
        delay_min: Duration::ZERO,
        delay_max: Duration::ZERO,
        total_input_txs: 20,
        duration: Duration::from_secs(10),
        find_time_min: Duration::from_secs(1),
        find_time_max: Duration::from_secs(1),
    };
    let mut runner = SimulationRunner::new(config, 42);
    runner.run();

    let mined: u64 = runner.nodes().iter().map(|n| n.stats.mined_blocks).sum();
    assert!(mined >= 1, "the miner must resolve at least one block");

    let tip = runner.node(0).unwrap().best_tip();
    for node in runner.nodes() {
        assert_eq!(node.best_tip(), tip, "all nodes agree on the final tip");
    }
    assert!(runner.node(0).unwrap().tip_height() >= 1);
    assert_eq!(runner.global_stale_count(), 0, "one miner cannot fork");

    assert_invariants(&runner);
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario: two miners, competing tips
// ═══════════════════════════════════════════════════════════════════════════

/// Two miners racing behind a long gossip delay build competing branches;
/// somewhere along the run the lead changes hands and nodes reorganize.
#[test]
fn test_competing_miners_reorg() {
    let config = SimConfig {
        num_nodes: 4,
        num_miners: 2,
        block_size_limit_bytes: 1_000,
        tx_rate_per_sec: 10.0,
        min_tx_size_bytes: 100,
        max_tx_size_bytes: 600,
        mean_tx_size_bytes: 300.0,
        stddev_tx_size_bytes: 150.0,
        delay_min: Duration::from_secs(5),
        delay_max: Duration::from_secs(5),
        total_input_txs: 6_000,
        duration: Duration::from_secs(600),
        find_time_min: Duration::from_secs(1),
        find_time_max: Duration::from_secs(5),
    };
    let mut runner = SimulationRunner::new(config, 42);
    runner.run();

    let reorgs: u64 = runner.nodes().iter().map(|n| n.stats.handled_reorgs).sum();
    assert!(reorgs > 0, "competing miners must force at least one reorg");
    assert!(runner.global_stale_count() > 0, "reorgs displace blocks");

    let stale: u64 = runner.nodes().iter().map(|n| n.stats.stale_in_reorg).sum();
    assert_eq!(
        stale,
        runner.global_stale_count(),
        "the global counter is the sum of per-node displacements"
    );

    assert_invariants(&runner);
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario: orphan replay
// ═══════════════════════════════════════════════════════════════════════════

/// A height-2 block arriving before its height-1 parent is parked, then
/// replayed at the same virtual instant once the parent lands, and the tip
/// jumps straight to height 2.
#[test]
fn test_orphan_parked_then_replayed() {
    let config = SimConfig {
        num_nodes: 2,
        num_miners: 0,
        tx_rate_per_sec: 0.0,
        delay_min: Duration::ZERO,
        delay_max: Duration::ZERO,
        duration: Duration::from_secs(100),
        ..SimConfig::default()
    };
    let mut runner = SimulationRunner::new(config, 42);

    let genesis = runner.genesis_hash();
    let b1 = Arc::new(Block::new(1, genesis, Duration::ZERO, 1, vec![]));
    let b2 = Arc::new(Block::new(2, b1.hash, Duration::ZERO, 1, vec![]));

    // Child first, parent second.
    runner.schedule_initial_event(
        Duration::from_millis(1),
        Event::ReceiveBlock {
            target: 0,
            block: b2.clone(),
        },
    );
    runner.schedule_initial_event(
        Duration::from_millis(2),
        Event::ReceiveBlock {
            target: 0,
            block: b1.clone(),
        },
    );

    let reason = runner.run();
    assert_eq!(reason, StopReason::QueueEmpty);

    let node = runner.node(0).unwrap();
    assert_eq!(node.stats.received_orphans, 1);
    assert_eq!(node.stats.processed_orphans, 1);
    assert_eq!(node.best_tip(), b2.hash);
    assert_eq!(node.tip_height(), 2);

    // The replay happened at the parent's arrival instant.
    assert_eq!(runner.now(), Duration::from_millis(2));

    // Relay carried both blocks to the other node as well.
    assert_eq!(runner.node(1).unwrap().best_tip(), b2.hash);

    assert_invariants(&runner);
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario: reorg restores displaced transactions
// ═══════════════════════════════════════════════════════════════════════════

/// A transaction packed only into the losing branch must reappear in the
/// mempool after the longer branch wins.
#[test]
fn test_reorg_restores_mempool() {
    let config = SimConfig {
        num_nodes: 2,
        num_miners: 0,
        tx_rate_per_sec: 0.0,
        delay_min: Duration::ZERO,
        delay_max: Duration::ZERO,
        duration: Duration::from_secs(100),
        ..SimConfig::default()
    };
    let mut runner = SimulationRunner::new(config, 42);
    let genesis = runner.genesis_hash();

    let displaced = Transaction::new(TxId { seq: 1, tag: 7 }, Duration::ZERO, 100);
    let a1 = Arc::new(Block::new(1, genesis, Duration::ZERO, 0, vec![displaced.clone()]));
    let b1 = Arc::new(Block::new(1, genesis, Duration::ZERO, 1, vec![]));
    let b2 = Arc::new(Block::new(2, b1.hash, Duration::ZERO, 1, vec![]));

    for (ms, block) in [(1, a1.clone()), (2, b1.clone()), (3, b2.clone())] {
        runner.schedule_initial_event(
            Duration::from_millis(ms),
            Event::ReceiveBlock { target: 0, block },
        );
    }
    runner.run();

    let node = runner.node(0).unwrap();
    assert_eq!(node.best_tip(), b2.hash);
    assert_eq!(node.stats.handled_reorgs, 1);
    assert_eq!(node.stats.stale_in_reorg, 1);
    assert!(
        node.mempool_contains(&displaced.id),
        "displaced transaction returns to the mempool"
    );

    // Node 1 saw the same three blocks via relay and reorged too.
    assert_eq!(runner.global_stale_count(), 2);

    assert_invariants(&runner);
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario: duration stop
// ═══════════════════════════════════════════════════════════════════════════

/// With an unreachable find time the chain never grows, and the run ends at
/// exactly the duration cap with undispatched events still queued.
#[test]
fn test_duration_stop_leaves_queue_nonempty() {
    let config = SimConfig {
        num_nodes: 3,
        num_miners: 1,
        block_size_limit_bytes: 1_000,
        tx_rate_per_sec: 4.0,
        delay_min: Duration::from_millis(500),
        delay_max: Duration::from_millis(500),
        total_input_txs: 1_000,
        duration: Duration::from_secs(10),
        find_time_min: Duration::from_secs(100),
        find_time_max: Duration::from_secs(100),
        ..SimConfig::default()
    };
    let mut runner = SimulationRunner::new(config, 42);
    let reason = runner.run();

    assert_eq!(reason, StopReason::DurationReached);
    assert_eq!(runner.now(), Duration::from_secs(10), "clock pinned to the cap");
    assert!(runner.queue_len() > 0, "boundary events stay queued");

    // A 100 second find time never resolves inside a 10 second run.
    for node in runner.nodes() {
        assert_eq!(node.block_count(), 1, "genesis only");
        assert_eq!(node.stats.mined_blocks, 0);
    }

    assert_invariants(&runner);
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenario: injection exhaustion
// ═══════════════════════════════════════════════════════════════════════════

/// The source stops at its cap; with no miners the queue then drains.
#[test]
fn test_injection_exhaustion() {
    let config = SimConfig {
        num_nodes: 3,
        num_miners: 0,
        tx_rate_per_sec: 1.0,
        total_input_txs: 5,
        duration: Duration::from_secs(1_000),
        ..SimConfig::default()
    };
    let mut runner = SimulationRunner::new(config, 42);
    let reason = runner.run();

    assert_eq!(reason, StopReason::QueueEmpty);
    assert_eq!(runner.generated_count(), 5, "exactly the configured cap");
    assert_eq!(runner.stats().transactions_injected, 5);
    assert!(runner.now() < Duration::from_secs(1_000));

    // Flooding delivered all five transactions everywhere.
    for node in runner.nodes() {
        assert_eq!(node.mempool_len(), 5);
    }

    assert_invariants(&runner);
}

// ═══════════════════════════════════════════════════════════════════════════
// Boundary behaviors
// ═══════════════════════════════════════════════════════════════════════════

/// Zero rate: nothing is ever scheduled, miners stay idle-waiting.
#[test]
fn test_zero_rate_runs_nothing() {
    let config = SimConfig {
        num_nodes: 3,
        num_miners: 2,
        tx_rate_per_sec: 0.0,
        ..SimConfig::default()
    };
    let mut runner = SimulationRunner::new(config, 42);
    let reason = runner.run();

    assert_eq!(reason, StopReason::QueueEmpty);
    assert_eq!(runner.stats().events_processed, 0);
    assert_eq!(runner.generated_count(), 0);
    for node in runner.nodes() {
        assert_eq!(node.stats.mining_attempts, 0);
        if node.is_miner() {
            assert!(node.is_waiting_for_mempool());
        }
    }
}

/// Zero miners: transactions flood, the chain never advances, no forks.
#[test]
fn test_zero_miners_no_blocks() {
    let config = SimConfig {
        num_nodes: 4,
        num_miners: 0,
        tx_rate_per_sec: 4.0,
        total_input_txs: 50,
        duration: Duration::from_secs(60),
        ..SimConfig::default()
    };
    let mut runner = SimulationRunner::new(config, 42);
    runner.run();

    assert_eq!(runner.global_stale_count(), 0);
    for node in runner.nodes() {
        assert_eq!(node.block_count(), 1, "genesis only");
        assert_eq!(node.best_tip(), runner.genesis_hash());
        assert_eq!(node.stats.handled_reorgs, 0);
    }
}

/// A block size limit below any single transaction still advances the
/// chain, with empty but valid blocks.
#[test]
fn test_tiny_block_limit_mines_empty_blocks() {
    let config = SimConfig {
        num_nodes: 2,
        num_miners: 1,
        block_size_limit_bytes: 50,
        tx_rate_per_sec: 1.0,
        min_tx_size_bytes: 100,
        max_tx_size_bytes: 600,
        mean_tx_size_bytes: 300.0,
        stddev_tx_size_bytes: 150.0,
        delay_min: Duration::ZERO,
        delay_max: Duration::ZERO,
        total_input_txs: 5,
        duration: Duration::from_secs(10),
        find_time_min: Duration::from_secs(1),
        find_time_max: Duration::from_secs(1),
    };
    let mut runner = SimulationRunner::new(config, 42);
    runner.run();

    let node = runner.node(0).unwrap();
    assert!(node.tip_height() >= 1, "chain advances despite oversized txs");

    let mut cursor = node.best_tip();
    while cursor != runner.genesis_hash() {
        let block = node.block(&cursor).unwrap().clone();
        assert_eq!(block.header.tx_count, 0, "no transaction can fit");
        cursor = block.header.prev_hash;
    }

    assert_invariants(&runner);
}

/// First-inclusion metadata is recorded once per transaction.
#[test]
fn test_tx_status_records_first_inclusion() {
    let config = SimConfig {
        num_nodes: 3,
        num_miners: 1,
        block_size_limit_bytes: 300,
        tx_rate_per_sec: 1.0,
        mean_tx_size_bytes: 300.0,
        stddev_tx_size_bytes: 0.0,
        delay_min: Duration::ZERO,
        delay_max: Duration::ZERO,
        total_input_txs: 20,
        duration: Duration::from_secs(10),
        find_time_min: Duration::from_secs(1),
        find_time_max: Duration::from_secs(1),
        ..SimConfig::default()
    };
    let mut runner = SimulationRunner::new(config, 42);
    runner.run();

    let node = runner.node(0).unwrap();
    let mut cursor = node.best_tip();
    let mut saw_included = false;
    while cursor != runner.genesis_hash() {
        let block = node.block(&cursor).unwrap().clone();
        for tx in &block.transactions {
            let status = runner.tx_status(&tx.id).expect("injected tx has status");
            assert_eq!(status.included_in, Some(block.hash));
            assert_eq!(status.first_block_time, block.found_time);
            assert!(status.injected_at <= block.found_time.unwrap());
            saw_included = true;
        }
        cursor = block.header.prev_hash;
    }
    assert!(saw_included, "at least one transaction was packed");
}
