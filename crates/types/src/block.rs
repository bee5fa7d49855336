//! Block and BlockHeader types.

use crate::{Hash, NodeIndex, Transaction};
use std::time::Duration;

/// Block header: chain position plus assembly metadata.
///
/// `timestamp` records when the miner *began* assembling the candidate;
/// the resolution time lives on [`Block::found_time`]. Average block
/// intervals are computed over found-times, not header timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Height in the chain (genesis = 0).
    pub height: u64,
    /// Virtual time the mining attempt started.
    pub timestamp: Duration,
    /// Hash of the parent block. `Hash::ZERO` for genesis.
    pub prev_hash: Hash,
    /// Node that assembled this block. `None` for genesis.
    pub miner: Option<NodeIndex>,
    /// Number of transactions packed into the block.
    pub tx_count: u32,
}

/// A block: header, ordered transactions, content hash, resolution time.
///
/// Blocks are immutable once they enter any node's block map. The hash
/// covers the header fields and the ordered transaction ids:
/// `SHA256(height || timestamp || prev_hash || miner || tx_count || tx ids)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub hash: Hash,
    /// Virtual time the candidate "resolved". `None` until the miner's
    /// found event fires; `Some(ZERO)` for genesis.
    pub found_time: Option<Duration>,
}

impl Block {
    /// Assemble a candidate block and compute its content hash.
    pub fn new(
        height: u64,
        prev_hash: Hash,
        timestamp: Duration,
        miner: NodeIndex,
        transactions: Vec<Transaction>,
    ) -> Self {
        let header = BlockHeader {
            height,
            timestamp,
            prev_hash,
            miner: Some(miner),
            tx_count: transactions.len() as u32,
        };
        let hash = compute_block_hash(&header, &transactions);
        Self {
            header,
            transactions,
            hash,
            found_time: None,
        }
    }

    /// The genesis block: height 0, zero parent, no miner, no transactions,
    /// resolved at the start of virtual time.
    pub fn genesis() -> Self {
        let header = BlockHeader {
            height: 0,
            timestamp: Duration::ZERO,
            prev_hash: Hash::ZERO,
            miner: None,
            tx_count: 0,
        };
        let hash = compute_block_hash(&header, &[]);
        Self {
            header,
            transactions: Vec::new(),
            hash,
            found_time: Some(Duration::ZERO),
        }
    }

    /// Sum of the declared sizes of the packed transactions.
    pub fn byte_size(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.size).sum()
    }
}

/// Compute the content hash of a block from its header fields and the
/// ordered transaction id sequence.
pub fn compute_block_hash(header: &BlockHeader, transactions: &[Transaction]) -> Hash {
    // Genesis carries miner -1, matching the zero-parent sentinel scheme.
    let miner = header.miner.map(|m| m as i64).unwrap_or(-1).to_le_bytes();
    let height = header.height.to_le_bytes();
    let timestamp = header.timestamp.as_nanos().to_le_bytes();
    let tx_count = header.tx_count.to_le_bytes();
    let tx_ids: Vec<String> = transactions.iter().map(|tx| tx.id.to_string()).collect();

    let mut parts: Vec<&[u8]> = vec![
        &height,
        &timestamp,
        header.prev_hash.as_bytes(),
        &miner,
        &tx_count,
    ];
    for id in &tx_ids {
        parts.push(id.as_bytes());
    }
    Hash::from_parts(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxId;

    fn tx(seq: u64, size: u64) -> Transaction {
        Transaction::new(TxId { seq, tag: 0 }, Duration::ZERO, size)
    }

    #[test]
    fn test_hash_deterministic() {
        let txs = vec![tx(1, 100), tx(2, 200)];
        let a = Block::new(3, Hash::ZERO, Duration::from_secs(5), 0, txs.clone());
        let b = Block::new(3, Hash::ZERO, Duration::from_secs(5), 0, txs);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_covers_tx_order() {
        let a = Block::new(1, Hash::ZERO, Duration::ZERO, 0, vec![tx(1, 1), tx(2, 1)]);
        let b = Block::new(1, Hash::ZERO, Duration::ZERO, 0, vec![tx(2, 1), tx(1, 1)]);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_covers_miner() {
        let a = Block::new(1, Hash::ZERO, Duration::ZERO, 0, vec![]);
        let b = Block::new(1, Hash::ZERO, Duration::ZERO, 1, vec![]);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_genesis_shape() {
        let genesis = Block::genesis();
        assert_eq!(genesis.header.height, 0);
        assert_eq!(genesis.header.prev_hash, Hash::ZERO);
        assert_eq!(genesis.header.miner, None);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.found_time, Some(Duration::ZERO));
        // Genesis hash is stable across constructions.
        assert_eq!(genesis.hash, Block::genesis().hash);
    }

    #[test]
    fn test_byte_size_sums_transactions() {
        let block = Block::new(1, Hash::ZERO, Duration::ZERO, 0, vec![tx(1, 150), tx(2, 350)]);
        assert_eq!(block.byte_size(), 500);
    }
}
