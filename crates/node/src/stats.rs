//! Per-node counters reported after a run.

/// Statistics collected by a single node.
///
/// All counters are monotone; the reorg counters only ever grow, even when a
/// later reorg switches back to a previously displaced branch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeStats {
    /// Transactions delivered to this node (including duplicates).
    pub received_tx: u64,
    /// Transactions admitted to the mempool.
    pub added_to_mempool: u64,
    /// Per-hop transaction relays scheduled on behalf of this node.
    pub relayed_tx: u64,
    /// Blocks delivered to this node (including duplicates and orphans).
    pub received_blocks: u64,
    /// Blocks that passed structural validation and entered the DAG.
    pub validated_blocks: u64,
    /// Per-hop block relays scheduled on behalf of this node.
    pub relayed_blocks: u64,
    /// Blocks parked because their parent was unknown.
    pub received_orphans: u64,
    /// Parked blocks replayed after their parent arrived.
    pub processed_orphans: u64,
    /// Reorgs this node performed.
    pub handled_reorgs: u64,
    /// Blocks displaced from this node's best path across all reorgs.
    pub stale_in_reorg: u64,
    /// Mining attempts that passed the stale guards.
    pub mining_attempts: u64,
    /// Blocks this node successfully mined.
    pub mined_blocks: u64,
}
