//! Event types dispatched by the simulation kernel.

use crate::JobId;
use powmesh_types::{Block, Hash, NodeIndex, Transaction};
use std::sync::Arc;

/// All events the kernel dispatches.
///
/// Events are **passive data** describing something scheduled to happen at a
/// virtual timestamp. The timestamp and priority live in the queue key, not
/// in the event itself.
///
/// Each kind carries a default priority equal to its ordinal; two scheduling
/// sites override it to keep a three-tier split at a single instant:
/// orphan replays ([`Event::PRIORITY_ORPHAN_REPLAY`]) drain first, then
/// same-instant injection deliveries ([`Event::PRIORITY_INJECTED_DELIVERY`]),
/// then everything at its default.
#[derive(Debug, Clone)]
pub enum Event {
    /// Pull the next transaction from the source and hand it to a random
    /// origin node. Self-scheduling while the source has output left.
    InjectTransaction,

    /// A transaction delivered to a specific node.
    ReceiveTransaction {
        target: NodeIndex,
        tx: Arc<Transaction>,
    },

    /// A miner begins assembling a candidate on the recorded parent.
    /// Stale if the tip has moved by dispatch time.
    AttemptMining {
        miner: NodeIndex,
        parent: Hash,
        height: u64,
    },

    /// The virtual instant a miner's candidate "solves". Honored only when
    /// the miner's active job id still matches `job`.
    BlockFound {
        miner: NodeIndex,
        block: Block,
        job: JobId,
    },

    /// A block delivered to a specific node.
    ReceiveBlock {
        target: NodeIndex,
        block: Arc<Block>,
    },
}

impl Event {
    /// Priority for orphan replays scheduled at the current instant, so the
    /// parked children drain before any newly arriving block.
    pub const PRIORITY_ORPHAN_REPLAY: u8 = 0;

    /// Priority for the origin-node delivery scheduled by the injector.
    pub const PRIORITY_INJECTED_DELIVERY: u8 = 1;

    /// Default priority: the event kind's ordinal. Lower fires first at an
    /// equal timestamp.
    pub fn priority(&self) -> u8 {
        match self {
            Event::InjectTransaction => 0,
            Event::ReceiveTransaction { .. } => 1,
            Event::AttemptMining { .. } => 2,
            Event::BlockFound { .. } => 3,
            Event::ReceiveBlock { .. } => 4,
        }
    }

    /// Event kind name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::InjectTransaction => "InjectTransaction",
            Event::ReceiveTransaction { .. } => "ReceiveTransaction",
            Event::AttemptMining { .. } => "AttemptMining",
            Event::BlockFound { .. } => "BlockFound",
            Event::ReceiveBlock { .. } => "ReceiveBlock",
        }
    }
}
