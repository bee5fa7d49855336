//! Deterministic simulation runner.
//!
//! Owns the virtual clock, the event queue, the node set, and the global
//! counters. Dispatches events to node handlers and executes the actions
//! they return. Nodes never reach back into the runner.

use crate::event_queue::EventKey;
use crate::{NetworkModel, TxSource};
use powmesh_core::{Action, Event, NodeIndex};
use powmesh_node::NodeState;
use powmesh_types::{Block, Hash, SimConfig, Transaction, TxId};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Why the main loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The event queue drained completely.
    QueueEmpty,
    /// The next event would fire at or past the configured duration.
    DurationReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::QueueEmpty => write!(f, "event queue empty"),
            StopReason::DurationReached => write!(f, "duration limit reached"),
        }
    }
}

/// Lifecycle metadata for one injected transaction.
#[derive(Debug, Clone)]
pub struct TxStatusEntry {
    /// Virtual time the injector produced the transaction.
    pub injected_at: Duration,
    /// First block that packed it, if any miner resolved one.
    pub included_in: Option<Hash>,
    /// Found-time of that first block.
    pub first_block_time: Option<Duration>,
}

/// Statistics collected during a run.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events dispatched.
    pub events_processed: u64,
    /// Dispatched events grouped by kind ordinal.
    pub events_by_kind: [u64; 5],
    /// Transactions pulled from the source.
    pub transactions_injected: u64,
}

/// Deterministic simulation runner.
///
/// Given the same seed and configuration, produces identical results every
/// run: one seeded [`ChaCha8Rng`] drives the miner permutation, the peer
/// mesh, origin selection, size and find-time draws, packing shuffles, and
/// every hop delay.
pub struct SimulationRunner {
    config: Arc<SimConfig>,

    /// Per-node state machines. Index corresponds to NodeIndex.
    nodes: Vec<NodeState>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic FIFO ordering.
    sequence: u64,

    /// Current virtual time. Monotone non-decreasing, starts at zero.
    now: Duration,

    network: NetworkModel,
    rng: ChaCha8Rng,
    tx_source: TxSource,

    /// Lifecycle ledger for every injected transaction.
    tx_status: HashMap<TxId, TxStatusEntry>,

    /// Blocks displaced by reorgs across all nodes.
    global_stale_count: u64,

    genesis: Arc<Block>,
    stats: SimulationStats,
    stop_reason: Option<StopReason>,
    injection_scheduled: bool,
    last_progress_log: Duration,
}

impl SimulationRunner {
    // ═══════════════════════════════════════════════════════════════════════
    // Construction
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a runner: build genesis, designate miners, wire the peer mesh.
    ///
    /// The caller is expected to have validated the configuration.
    pub fn new(config: SimConfig, seed: u64) -> Self {
        let config = Arc::new(config);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let genesis = Arc::new(Block::genesis());

        // Miner designation: node i mines iff its permuted index lands
        // below the miner count.
        let num_nodes = config.num_nodes;
        let mut perm: Vec<u32> = (0..num_nodes).collect();
        perm.shuffle(&mut rng);

        let mut nodes = Vec::with_capacity(num_nodes as usize);
        for index in 0..num_nodes {
            let is_miner = perm[index as usize] < config.num_miners;
            nodes.push(NodeState::new(
                index,
                is_miner,
                genesis.clone(),
                config.clone(),
            ));
        }

        // Random peer mesh: 3..6 outbound attempts per node, reverse edges
        // added symmetrically, attempts capped at 2N. Used for reporting;
        // relay floods to all nodes.
        if num_nodes > 1 {
            for i in 0..num_nodes as usize {
                let wanted = 3 + rng.gen_range(0..3);
                let mut connected = 0;
                let mut attempts = 0;
                while connected < wanted && nodes[i].peers().len() < num_nodes as usize - 1 {
                    let peer = rng.gen_range(0..num_nodes);
                    if peer as usize != i && !nodes[i].peers().contains(&peer) {
                        nodes[i].add_peer(peer);
                        nodes[peer as usize].add_peer(i as NodeIndex);
                        connected += 1;
                    }
                    attempts += 1;
                    if attempts > num_nodes * 2 {
                        break;
                    }
                }
            }
        }

        let network = NetworkModel::new(&config);
        let tx_source = TxSource::new(&config);

        info!(
            num_nodes,
            num_miners = config.num_miners,
            seed,
            "created simulation runner"
        );

        Self {
            config,
            nodes,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network,
            rng,
            tx_source,
            tx_status: HashMap::new(),
            global_stale_count: 0,
            genesis,
            stats: SimulationStats::default(),
            stop_reason: None,
            injection_scheduled: false,
            last_progress_log: Duration::ZERO,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Main Loop
    // ═══════════════════════════════════════════════════════════════════════

    /// Run until the queue drains or the duration limit is hit.
    pub fn run(&mut self) -> StopReason {
        self.schedule_first_injection();

        let reason = loop {
            let Some((&key, _)) = self.event_queue.first_key_value() else {
                break StopReason::QueueEmpty;
            };

            // The boundary event is left on the queue; time is pinned to
            // the cap so reported durations are exact.
            if key.time >= self.config.duration {
                self.now = self.config.duration;
                break StopReason::DurationReached;
            }

            let (key, event) = self.event_queue.pop_first().unwrap();
            // A same-instant pop can carry a timestamp just behind the
            // clock; clamp up, never rewind.
            self.now = self.now.max(key.time);

            self.stats.events_processed += 1;
            self.stats.events_by_kind[event.priority() as usize] += 1;
            self.log_progress();

            trace!(time = ?self.now, kind = event.type_name(), "dispatching event");
            self.dispatch(event);
        };

        self.stop_reason = Some(reason);
        info!(
            reason = %reason,
            final_time_secs = self.now.as_secs_f64(),
            events = self.stats.events_processed,
            remaining = self.event_queue.len(),
            "simulation loop finished"
        );
        reason
    }

    /// Schedule the first injection, once, iff the source can produce.
    fn schedule_first_injection(&mut self) {
        if self.injection_scheduled {
            return;
        }
        self.injection_scheduled = true;

        if self.config.tx_rate_per_sec > 0.0 && self.config.total_input_txs > 0 {
            let first = Duration::from_secs_f64(1.0 / self.config.tx_rate_per_sec);
            self.schedule(first, Event::InjectTransaction);
        } else {
            warn!("transaction rate or input cap is zero, nothing will be injected");
        }
    }

    fn log_progress(&mut self) {
        if self.now - self.last_progress_log > Duration::from_secs(20)
            || self.stats.events_processed % 10_000 == 0
        {
            info!(
                time_secs = self.now.as_secs_f64(),
                of_secs = self.config.duration.as_secs_f64(),
                events = self.stats.events_processed,
                queue = self.event_queue.len(),
                injected = self.tx_source.generated_count(),
                stale_blocks = self.global_stale_count,
                "progress"
            );
            self.last_progress_log = self.now;
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════════

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::InjectTransaction => self.handle_inject(),

            Event::ReceiveTransaction { target, tx } => {
                let node = &mut self.nodes[target as usize];
                node.set_time(self.now);
                let actions = node.receive_transaction(tx);
                self.execute_actions(target, actions);
            }

            Event::AttemptMining {
                miner,
                parent,
                height,
            } => {
                self.nodes[miner as usize].set_time(self.now);
                let actions =
                    self.nodes[miner as usize].attempt_mining(parent, height, &mut self.rng);
                self.execute_actions(miner, actions);
            }

            Event::BlockFound { miner, block, job } => {
                let node = &mut self.nodes[miner as usize];
                node.set_time(self.now);
                let actions = node.block_found(block, job);
                self.execute_actions(miner, actions);
            }

            Event::ReceiveBlock { target, block } => {
                let node = &mut self.nodes[target as usize];
                node.set_time(self.now);
                let actions = node.receive_block(block);
                self.execute_actions(target, actions);
            }
        }
    }

    /// Pull the next transaction from the source, hand it to a random
    /// origin node at this instant, and self-schedule the next injection.
    fn handle_inject(&mut self) {
        let Some(tx) = self.tx_source.next(self.now, &mut self.rng) else {
            return;
        };
        self.stats.transactions_injected += 1;
        self.tx_status.insert(
            tx.id,
            TxStatusEntry {
                injected_at: self.now,
                included_in: None,
                first_block_time: None,
            },
        );

        let origin = self.rng.gen_range(0..self.config.num_nodes);
        trace!(tx = %tx.id, origin, size = tx.size, "injecting transaction");
        self.schedule_with_priority(
            self.now,
            Event::ReceiveTransaction {
                target: origin,
                tx: Arc::new(tx),
            },
            Event::PRIORITY_INJECTED_DELIVERY,
        );

        if !self.tx_source.is_exhausted() && self.config.tx_rate_per_sec > 0.0 {
            let next = self.now + Duration::from_secs_f64(1.0 / self.config.tx_rate_per_sec);
            if next < self.config.duration {
                self.schedule(next, Event::InjectTransaction);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Action Execution
    // ═══════════════════════════════════════════════════════════════════════

    fn execute_actions(&mut self, from: NodeIndex, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::BroadcastTransaction(tx) => self.broadcast_transaction(from, tx),

                Action::BroadcastBlock(block) => self.broadcast_block(from, block),

                Action::ScheduleMiningAttempt { parent, height } => {
                    self.schedule(
                        self.now,
                        Event::AttemptMining {
                            miner: from,
                            parent,
                            height,
                        },
                    );
                }

                Action::ScheduleBlockFound {
                    found_at,
                    block,
                    job,
                } => {
                    self.schedule(
                        found_at,
                        Event::BlockFound {
                            miner: from,
                            block,
                            job,
                        },
                    );
                }

                Action::ReplayOrphan(block) => {
                    self.schedule_with_priority(
                        self.now,
                        Event::ReceiveBlock {
                            target: from,
                            block,
                        },
                        Event::PRIORITY_ORPHAN_REPLAY,
                    );
                }

                Action::RecordInclusion {
                    block,
                    found_time,
                    tx_ids,
                } => {
                    for id in tx_ids {
                        if let Some(entry) = self.tx_status.get_mut(&id) {
                            if entry.included_in.is_none() {
                                entry.included_in = Some(block);
                                entry.first_block_time = Some(found_time);
                            }
                        }
                    }
                }

                Action::AddStaleBlocks(count) => {
                    self.global_stale_count += count;
                    debug!(
                        node = from,
                        displaced = count,
                        total = self.global_stale_count,
                        "reorg displaced blocks"
                    );
                }
            }
        }
    }

    /// Flood a transaction to every node but the sender, one sampled delay
    /// per hop.
    fn broadcast_transaction(&mut self, from: NodeIndex, tx: Arc<Transaction>) {
        for target in 0..self.nodes.len() as NodeIndex {
            if target == from {
                continue;
            }
            let delay = self.network.sample_delay(&mut self.rng);
            self.schedule(
                self.now + delay,
                Event::ReceiveTransaction {
                    target,
                    tx: tx.clone(),
                },
            );
            self.nodes[from as usize].stats.relayed_tx += 1;
        }
    }

    /// Flood a block to every node but the sender.
    fn broadcast_block(&mut self, from: NodeIndex, block: Arc<Block>) {
        for target in 0..self.nodes.len() as NodeIndex {
            if target == from {
                continue;
            }
            let delay = self.network.sample_delay(&mut self.rng);
            self.schedule(
                self.now + delay,
                Event::ReceiveBlock {
                    target,
                    block: block.clone(),
                },
            );
            self.nodes[from as usize].stats.relayed_blocks += 1;
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scheduling
    // ═══════════════════════════════════════════════════════════════════════

    /// Schedule an event at its default (kind-ordinal) priority.
    fn schedule(&mut self, time: Duration, event: Event) {
        let priority = event.priority();
        self.schedule_with_priority(time, event, priority);
    }

    fn schedule_with_priority(&mut self, time: Duration, event: Event, priority: u8) {
        self.sequence += 1;
        let key = EventKey {
            time,
            priority,
            sequence: self.sequence,
        };
        self.event_queue.insert(key, event);
    }

    /// Queue an event before the run starts (or between manual steps).
    /// Intended for tests and harnesses injecting deliveries directly.
    pub fn schedule_initial_event(&mut self, delay: Duration, event: Event) {
        self.schedule(self.now + delay, event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn node(&self, index: NodeIndex) -> Option<&NodeState> {
        self.nodes.get(index as usize)
    }

    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Blocks displaced by reorgs across all nodes.
    pub fn global_stale_count(&self) -> u64 {
        self.global_stale_count
    }

    /// Transactions the source has produced.
    pub fn generated_count(&self) -> u64 {
        self.tx_source.generated_count()
    }

    pub fn tx_status(&self, id: &TxId) -> Option<&TxStatusEntry> {
        self.tx_status.get(id)
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis.hash
    }

    /// Events still queued (non-zero after a duration stop).
    pub fn queue_len(&self) -> usize {
        self.event_queue.len()
    }
}
