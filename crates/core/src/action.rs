//! Actions returned by node handlers for the runner to execute.

use crate::JobId;
use powmesh_types::{Block, Hash, Transaction, TxId};
use std::sync::Arc;
use std::time::Duration;

/// All effects a node handler can request from the kernel.
///
/// Nodes never touch the event queue, the other nodes, or the global
/// counters directly; they describe the effect and the runner applies it.
#[derive(Debug, Clone)]
pub enum Action {
    /// Flood a transaction to every other node, one sampled delay per hop.
    BroadcastTransaction(Arc<Transaction>),

    /// Flood a block to every other node, one sampled delay per hop.
    BroadcastBlock(Arc<Block>),

    /// Queue an `AttemptMining` for this node at the current instant.
    ScheduleMiningAttempt { parent: Hash, height: u64 },

    /// Queue a `BlockFound` for this miner at `found_at`. The miner has
    /// already recorded `job` as its active job.
    ScheduleBlockFound {
        found_at: Duration,
        block: Block,
        job: JobId,
    },

    /// Re-deliver a parked orphan to this node at the current instant,
    /// ahead of any same-instant block arrivals.
    ReplayOrphan(Arc<Block>),

    /// Record first-inclusion metadata for the transactions of a freshly
    /// mined block. The kernel skips ids already recorded as included.
    RecordInclusion {
        block: Hash,
        found_time: Duration,
        tx_ids: Vec<TxId>,
    },

    /// Add blocks displaced by a completed reorg to the global stale counter.
    AddStaleBlocks(u64),
}
