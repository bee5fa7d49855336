//! Powmesh Simulator CLI
//!
//! Runs a deterministic proof-of-work gossip-network simulation with
//! configurable parameters and prints the end-of-run chain analysis.
//!
//! # Example
//!
//! ```bash
//! # Deterministic run with a fixed seed
//! powmesh-sim --seed 42 --nodes 20 --miners 5 --duration-secs 3600
//!
//! # A fast-block toy network
//! powmesh-sim --nodes 8 --miners 2 --find-time-min-secs 5 --find-time-max-secs 8
//! ```

use clap::Parser;
use powmesh_simulation::SimulationRunner;
use powmesh_simulator::report;
use powmesh_types::SimConfig;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Powmesh Simulator
///
/// Discrete-event simulation of a proof-of-work blockchain gossip network.
/// Single-threaded, reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "powmesh-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Total number of nodes
    #[arg(long, default_value = "20")]
    nodes: u32,

    /// Number of mining nodes
    #[arg(long, default_value = "5")]
    miners: u32,

    /// Max block size in bytes
    #[arg(long, default_value = "1048576")]
    block_size_bytes: u64,

    /// Transaction injection rate per second
    #[arg(long, default_value = "4.0")]
    tx_rate: f64,

    /// Clamp: minimum transaction size in bytes
    #[arg(long, default_value = "100")]
    tx_size_min: u64,

    /// Clamp: maximum transaction size in bytes
    #[arg(long, default_value = "600")]
    tx_size_max: u64,

    /// Mean transaction size in bytes (normal distribution)
    #[arg(long, default_value = "300.0")]
    tx_size_mean: f64,

    /// Standard deviation for transaction size (normal distribution)
    #[arg(long, default_value = "150.0")]
    tx_size_stddev: f64,

    /// Minimum network delay in milliseconds
    #[arg(long, default_value = "100")]
    delay_min_ms: u64,

    /// Maximum network delay in milliseconds
    #[arg(long, default_value = "500")]
    delay_max_ms: u64,

    /// Target total input transactions to inject
    #[arg(long, default_value = "20000")]
    total_txs: u64,

    /// Maximum simulation duration in seconds
    #[arg(long, default_value = "3600")]
    duration_secs: u64,

    /// Minimum time to find a block, in seconds
    #[arg(long, default_value = "600")]
    find_time_min_secs: u64,

    /// Maximum time to find a block, in seconds
    #[arg(long, default_value = "660")]
    find_time_max_secs: u64,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Node whose view the chain analysis is based on
    #[arg(long, default_value = "0")]
    reference_node: u32,
}

impl Args {
    fn into_config(self) -> SimConfig {
        SimConfig {
            num_nodes: self.nodes,
            num_miners: self.miners,
            block_size_limit_bytes: self.block_size_bytes,
            tx_rate_per_sec: self.tx_rate,
            min_tx_size_bytes: self.tx_size_min,
            max_tx_size_bytes: self.tx_size_max,
            mean_tx_size_bytes: self.tx_size_mean,
            stddev_tx_size_bytes: self.tx_size_stddev,
            delay_min: Duration::from_millis(self.delay_min_ms),
            delay_max: Duration::from_millis(self.delay_max_ms),
            total_input_txs: self.total_txs,
            duration: Duration::from_secs(self.duration_secs),
            find_time_min: Duration::from_secs(self.find_time_min_secs),
            find_time_max: Duration::from_secs(self.find_time_max_secs),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);
    let reference_node = args.reference_node;
    let config = args.into_config();

    if let Err(err) = config.validate() {
        error!("invalid configuration: {err}");
        std::process::exit(1);
    }
    if config.num_miners == 0 && config.num_nodes > 0 {
        warn!("no miners specified, the blockchain will not progress");
    }

    info!(?config, seed, "starting powmesh simulation");

    let mut runner = SimulationRunner::new(config, seed);
    let reason = runner.run();

    // ─── Results ───

    info!(
        stopped_at_secs = runner.now().as_secs_f64(),
        target_secs = runner.config().duration.as_secs_f64(),
        reason = %reason,
        "simulation finished"
    );
    info!(
        global_stale_blocks = runner.global_stale_count(),
        injected = runner.generated_count(),
        target = runner.config().total_input_txs,
        "run totals"
    );

    for node in runner.nodes() {
        let stats = &node.stats;
        info!(
            node = node.index(),
            miner = node.is_miner(),
            tip = %node.best_tip().short(),
            height = node.tip_height(),
            mempool = node.mempool_len(),
            rcvd_tx = stats.received_tx,
            added = stats.added_to_mempool,
            relayed_tx = stats.relayed_tx,
            rcvd_blocks = stats.received_blocks,
            validated = stats.validated_blocks,
            relayed_blocks = stats.relayed_blocks,
            orphans = stats.received_orphans,
            replayed = stats.processed_orphans,
            reorgs = stats.handled_reorgs,
            stale = stats.stale_in_reorg,
            attempts = stats.mining_attempts,
            mined = stats.mined_blocks,
            "node stats"
        );
    }

    let consensus = report::check_consensus(runner.nodes());
    info!(max_height = consensus.max_height, "chain consensus check");
    if consensus.agreed {
        let (tip, height, count) = &consensus.tips[0];
        info!(tip = %tip.short(), height, nodes = count, "all nodes agree on the final tip");
    } else {
        warn!("nodes disagree on the final tip:");
        for (tip, height, count) in &consensus.tips {
            warn!(tip = %tip.short(), height, nodes = count, "  competing tip");
        }
    }

    let Some(reference) = runner.node(reference_node) else {
        error!(reference_node, "reference node not found, skipping chain analysis");
        return;
    };

    match report::main_chain(reference, runner.genesis_hash()) {
        Err(err) => warn!("could not analyze main chain: {err}"),
        Ok(chain) => {
            match report::average_block_interval(&chain) {
                Err(err) => warn!("could not calculate average block interval: {err}"),
                Ok(avg) => info!(
                    actual_secs = avg.as_secs_f64(),
                    target_secs = runner.config().target_block_interval().as_secs_f64(),
                    "average block interval"
                ),
            }

            let tps = report::block_throughput(&chain, runner.config().target_block_interval());
            info!(tps = format!("{tps:.2}"), "average block throughput");
            info!(
                forked_heights = report::side_branches(reference),
                "fork observations on the reference node"
            );

            info!(reference_node, "final blockchain:");
            for line in report::chain_lines(&chain) {
                println!("{line}");
            }
        }
    }
}
