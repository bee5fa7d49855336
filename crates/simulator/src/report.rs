//! End-of-run chain analysis.

use powmesh_node::NodeState;
use powmesh_types::{Block, Hash};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Errors surfaced while analyzing a finished run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    /// A block referenced by the chain is missing from the node's view.
    #[error("block {hash} missing during chain traversal")]
    MissingBlock { hash: Hash },

    /// The tip-to-genesis walk exceeded its safety bound.
    #[error("traversed too many blocks ({steps}) while walking the chain")]
    TraversalBound { steps: u64 },

    /// Interval math needs at least two blocks.
    #[error("need at least two blocks to calculate an interval")]
    NotEnoughBlocks,

    /// No pair of consecutive blocks carried usable found-times.
    #[error("no valid block intervals found to average")]
    NoValidIntervals,
}

/// Walk a node's best chain from its tip back to genesis.
///
/// Returns the chain in genesis-first order. The walk is bounded by the
/// tip's expected height plus slack, so a corrupted view cannot loop the
/// reporter forever.
pub fn main_chain(node: &NodeState, genesis: Hash) -> Result<Vec<Arc<Block>>, ReportError> {
    let tip = node.best_tip();
    let limit = node.chain_work(&tip).map(|h| h + 10).unwrap_or(100_000);

    let mut chain = Vec::new();
    let mut cursor = tip;
    let mut steps = 0u64;
    loop {
        let block = node
            .block(&cursor)
            .ok_or(ReportError::MissingBlock { hash: cursor })?
            .clone();
        chain.push(block.clone());
        if cursor == genesis {
            break;
        }
        cursor = block.header.prev_hash;
        steps += 1;
        if steps > limit {
            return Err(ReportError::TraversalBound { steps });
        }
    }
    chain.reverse();
    Ok(chain)
}

/// Mean interval between consecutive block found-times.
///
/// Blocks without a found-time (never resolved by a miner in this view)
/// are skipped pairwise.
pub fn average_block_interval(chain: &[Arc<Block>]) -> Result<Duration, ReportError> {
    if chain.len() < 2 {
        return Err(ReportError::NotEnoughBlocks);
    }

    let mut total = Duration::ZERO;
    let mut count = 0u32;
    for pair in chain.windows(2) {
        let (Some(prev), Some(curr)) = (pair[0].found_time, pair[1].found_time) else {
            continue;
        };
        let Some(interval) = curr.checked_sub(prev) else {
            continue;
        };
        total += interval;
        count += 1;
    }

    if count == 0 {
        return Err(ReportError::NoValidIntervals);
    }
    Ok(total / count)
}

/// Average block-based throughput in transactions per second.
///
/// For each non-genesis block, its transaction count is spread over the
/// target interval; the result is the mean of those per-block rates.
pub fn block_throughput(chain: &[Arc<Block>], target_interval: Duration) -> f64 {
    if chain.len() <= 1 {
        return 0.0;
    }
    let interval_secs = target_interval.as_secs_f64();
    if interval_secs <= 0.0 {
        return 0.0;
    }

    let mut rate_sum = 0.0;
    let mut blocks = 0u32;
    for block in chain {
        if block.header.height == 0 {
            continue;
        }
        rate_sum += block.header.tx_count as f64 / interval_secs;
        blocks += 1;
    }
    if blocks == 0 {
        return 0.0;
    }
    rate_sum / blocks as f64
}

/// Final cross-node agreement summary.
#[derive(Debug, Clone)]
pub struct ConsensusReport {
    /// Distinct final tips with their height and the number of nodes on
    /// each, in stable hash order.
    pub tips: Vec<(Hash, u64, usize)>,
    /// Highest tip height reached by any node.
    pub max_height: u64,
    /// True when every node ended on the same tip.
    pub agreed: bool,
}

/// Compare every node's final tip.
pub fn check_consensus(nodes: &[NodeState]) -> ConsensusReport {
    let mut counts: BTreeMap<Hash, (u64, usize)> = BTreeMap::new();
    let mut max_height = 0u64;

    for node in nodes {
        let tip = node.best_tip();
        let height = node.tip_height();
        max_height = max_height.max(height);
        let entry = counts.entry(tip).or_insert((height, 0));
        entry.1 += 1;
    }

    ConsensusReport {
        agreed: counts.len() == 1,
        tips: counts
            .into_iter()
            .map(|(tip, (height, count))| (tip, height, count))
            .collect(),
        max_height,
    }
}

/// Heights at which a node accepted more than one block (observed forks).
pub fn side_branches(node: &NodeState) -> u64 {
    (0..=node.tip_height())
        .filter(|height| node.blocks_at_height(*height).len() > 1)
        .count() as u64
}

/// Human-readable lines describing a chain, genesis first.
pub fn chain_lines(chain: &[Arc<Block>]) -> Vec<String> {
    chain
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let indent = if i > 0 { "  -> " } else { "" };
            let miner = block
                .header
                .miner
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{}height {:>4} | hash {} | miner {:>3} | assembled {:>9.3}s | txs {:>4} | {} bytes",
                indent,
                block.header.height,
                block.hash.short(),
                miner,
                block.header.timestamp.as_secs_f64(),
                block.header.tx_count,
                block.byte_size(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use powmesh_types::{SimConfig, Transaction, TxId};

    fn test_node() -> (NodeState, Arc<Block>) {
        let genesis = Arc::new(Block::genesis());
        let config = Arc::new(SimConfig::default());
        (NodeState::new(0, false, genesis.clone(), config), genesis)
    }

    fn block_with_found_time(
        parent: &Block,
        miner: u32,
        txs: Vec<Transaction>,
        found_secs: u64,
    ) -> Arc<Block> {
        let mut block = Block::new(
            parent.header.height + 1,
            parent.hash,
            Duration::ZERO,
            miner,
            txs,
        );
        block.found_time = Some(Duration::from_secs(found_secs));
        Arc::new(block)
    }

    fn tx(seq: u64) -> Transaction {
        Transaction::new(TxId { seq, tag: 0 }, Duration::ZERO, 100)
    }

    #[test]
    fn test_main_chain_is_genesis_first() {
        let (mut node, genesis) = test_node();
        let b1 = block_with_found_time(&genesis, 1, vec![], 2);
        let b2 = block_with_found_time(&b1, 1, vec![], 4);
        node.receive_block(b1.clone());
        node.receive_block(b2.clone());

        let chain = main_chain(&node, genesis.hash).unwrap();
        let hashes: Vec<Hash> = chain.iter().map(|b| b.hash).collect();
        assert_eq!(hashes, vec![genesis.hash, b1.hash, b2.hash]);
    }

    #[test]
    fn test_main_chain_of_fresh_node_is_genesis_only() {
        let (node, genesis) = test_node();
        let chain = main_chain(&node, genesis.hash).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].hash, genesis.hash);
    }

    #[test]
    fn test_average_interval_over_found_times() {
        let (mut node, genesis) = test_node();
        let b1 = block_with_found_time(&genesis, 1, vec![], 2);
        let b2 = block_with_found_time(&b1, 1, vec![], 4);
        let b3 = block_with_found_time(&b2, 1, vec![], 8);
        node.receive_block(b1);
        node.receive_block(b2);
        node.receive_block(b3);

        let chain = main_chain(&node, genesis.hash).unwrap();
        // Genesis found at 0s: intervals are 2, 2, 4.
        let avg = average_block_interval(&chain).unwrap();
        assert_eq!(avg, Duration::from_secs(8) / 3);
    }

    #[test]
    fn test_average_interval_needs_two_blocks() {
        let (node, genesis) = test_node();
        let chain = main_chain(&node, genesis.hash).unwrap();
        assert_eq!(
            average_block_interval(&chain),
            Err(ReportError::NotEnoughBlocks)
        );
    }

    #[test]
    fn test_interval_skips_unresolved_blocks() {
        let (mut node, genesis) = test_node();
        // A block delivered without ever resolving has no found time.
        let mut raw = Block::new(1, genesis.hash, Duration::ZERO, 1, vec![]);
        raw.found_time = None;
        node.receive_block(Arc::new(raw));

        let chain = main_chain(&node, genesis.hash).unwrap();
        assert_eq!(
            average_block_interval(&chain),
            Err(ReportError::NoValidIntervals)
        );
    }

    #[test]
    fn test_block_throughput_spreads_txs_over_interval() {
        let (mut node, genesis) = test_node();
        let b1 = block_with_found_time(&genesis, 1, vec![tx(1), tx(2)], 2);
        let b2 = block_with_found_time(&b1, 1, vec![tx(3), tx(4), tx(5), tx(6)], 4);
        node.receive_block(b1);
        node.receive_block(b2);

        let chain = main_chain(&node, genesis.hash).unwrap();
        // Rates: 2/2s and 4/2s, mean 1.5 tx/s.
        let tps = block_throughput(&chain, Duration::from_secs(2));
        assert!((tps - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_zero_for_genesis_only() {
        let (node, genesis) = test_node();
        let chain = main_chain(&node, genesis.hash).unwrap();
        assert_eq!(block_throughput(&chain, Duration::from_secs(600)), 0.0);
    }

    #[test]
    fn test_consensus_agreement_and_disagreement() {
        let (mut a, genesis) = test_node();
        let config = Arc::new(SimConfig::default());
        let mut b = NodeState::new(1, false, Arc::new(Block::genesis()), config);

        let b1 = block_with_found_time(&genesis, 1, vec![], 2);
        a.receive_block(b1.clone());
        b.receive_block(b1.clone());

        let agreed = check_consensus(&[a, b]);
        assert!(agreed.agreed);
        assert_eq!(agreed.max_height, 1);
        assert_eq!(agreed.tips, vec![(b1.hash, 1, 2)]);

        // Now split them onto sibling branches.
        let (mut c, genesis) = test_node();
        let config = Arc::new(SimConfig::default());
        let mut d = NodeState::new(1, false, Arc::new(Block::genesis()), config);
        let fork_a = block_with_found_time(&genesis, 1, vec![], 2);
        let fork_b = block_with_found_time(&genesis, 2, vec![], 3);
        c.receive_block(fork_a);
        d.receive_block(fork_b);

        let split = check_consensus(&[c, d]);
        assert!(!split.agreed);
        assert_eq!(split.tips.len(), 2);
        assert_eq!(split.max_height, 1);
    }

    #[test]
    fn test_side_branches_counts_forked_heights() {
        let (mut node, genesis) = test_node();
        let fork_a = block_with_found_time(&genesis, 1, vec![], 2);
        let fork_b = block_with_found_time(&genesis, 2, vec![], 3);
        node.receive_block(fork_a);
        node.receive_block(fork_b);

        assert_eq!(side_branches(&node), 1);
    }

    #[test]
    fn test_chain_lines_shape() {
        let (mut node, genesis) = test_node();
        let b1 = block_with_found_time(&genesis, 3, vec![tx(1)], 2);
        node.receive_block(b1);

        let lines = chain_lines(&main_chain(&node, genesis.hash).unwrap());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("miner   -"), "genesis has no miner");
        assert!(lines[1].starts_with("  -> "));
        assert!(lines[1].contains("txs    1"));
    }
}
