//! Block reception, fork choice, and chain reorganization.

use crate::NodeState;
use powmesh_core::Action;
use powmesh_types::{Block, Hash};
use std::sync::Arc;
use tracing::{debug, trace, warn};

impl NodeState {
    /// Handle a block delivered to this node.
    ///
    /// Duplicates are dropped. A block whose parent is unknown is parked in
    /// the orphan pool and **not** relayed. A validated block enters the
    /// DAG, releases any orphans waiting on it (replayed ahead of other
    /// same-instant arrivals), and is relayed; if it carries more work than
    /// the current tip it becomes the new tip, reorging when it does not
    /// extend the old one.
    pub fn receive_block(&mut self, block: Arc<Block>) -> Vec<Action> {
        self.stats.received_blocks += 1;
        if self.blocks.contains_key(&block.hash) {
            return Vec::new();
        }

        let parent_height = match self.blocks.get(&block.header.prev_hash) {
            Some(parent) => parent.header.height,
            None => {
                self.stats.received_orphans += 1;
                trace!(
                    node = self.index,
                    hash = %block.hash.short(),
                    missing_parent = %block.header.prev_hash.short(),
                    "parking orphan block"
                );
                self.orphans
                    .entry(block.header.prev_hash)
                    .or_default()
                    .push(block);
                return Vec::new();
            }
        };

        if block.header.height != parent_height + 1 {
            return Vec::new();
        }
        self.stats.validated_blocks += 1;

        let work = self.chain_work[&block.header.prev_hash] + 1;
        self.blocks.insert(block.hash, block.clone());
        self.known_hashes.insert(block.hash);
        self.blocks_at_height
            .entry(block.header.height)
            .or_default()
            .push(block.hash);
        self.chain_work.insert(block.hash, work);

        // Packed transactions leave the mempool for good (unless a reorg
        // later displaces them).
        for tx in &block.transactions {
            self.mempool.remove(&tx.id);
            self.known_tx.insert(tx.id);
        }

        let mut actions = Vec::new();
        if let Some(parked) = self.orphans.remove(&block.hash) {
            self.stats.processed_orphans += parked.len() as u64;
            debug!(
                node = self.index,
                parent = %block.hash.short(),
                count = parked.len(),
                "replaying parked orphans"
            );
            for orphan in parked {
                actions.push(Action::ReplayOrphan(orphan));
            }
        }

        if work > self.tip_height() {
            let old_tip = self.best_tip;
            self.best_tip = block.hash;

            if block.header.prev_hash != old_tip {
                if let Some(stale) = self.handle_reorg(old_tip, block.hash) {
                    actions.push(Action::AddStaleBlocks(stale));
                }
            }

            actions.push(Action::BroadcastBlock(block));
            actions.extend(self.restart_mining());
        } else {
            actions.push(Action::BroadcastBlock(block));
        }

        actions
    }

    /// Switch the best path from `old_tip` to `new_tip`.
    ///
    /// Walks both branches back to their common ancestor, counts the
    /// displaced blocks, and restores to the mempool every displaced
    /// transaction that did not make it into the new path. Returns the
    /// number of blocks displaced by this reorg, or `None` when the
    /// ancestor search failed and the reorg was abandoned.
    fn handle_reorg(&mut self, old_tip: Hash, new_tip: Hash) -> Option<u64> {
        self.stats.handled_reorgs += 1;

        let Some(ancestor) = self.find_common_ancestor(old_tip, new_tip) else {
            warn!(
                node = self.index,
                old_tip = %old_tip.short(),
                new_tip = %new_tip.short(),
                "no common ancestor found, abandoning reorg"
            );
            return None;
        };

        // Stale walk: everything from the old tip down to the ancestor.
        let mut stale_blocks = Vec::new();
        let mut cursor = old_tip;
        while cursor != ancestor {
            let Some(block) = self.blocks.get(&cursor) else {
                break;
            };
            stale_blocks.push(block.clone());
            self.stats.stale_in_reorg += 1;
            cursor = block.header.prev_hash;
        }

        // New walk: the adopted path down to the ancestor.
        let mut new_blocks = Vec::new();
        let mut cursor = new_tip;
        while cursor != ancestor {
            let Some(block) = self.blocks.get(&cursor) else {
                break;
            };
            new_blocks.push(block.clone());
            cursor = block.header.prev_hash;
        }

        debug!(
            node = self.index,
            stale = stale_blocks.len(),
            adopted = new_blocks.len(),
            ancestor = %ancestor.short(),
            "reorganizing chain"
        );

        // A displaced transaction that is absent from the new path goes
        // back to the mempool, whether or not we already knew its id.
        for stale_block in &stale_blocks {
            for tx in &stale_block.transactions {
                let in_new_path = new_blocks
                    .iter()
                    .any(|b| b.transactions.iter().any(|t| t.id == tx.id));
                if !in_new_path {
                    self.known_tx.insert(tx.id);
                    self.mempool.entry(tx.id).or_insert_with(|| tx.clone());
                }
            }
        }

        Some(stale_blocks.len() as u64)
    }

    /// Lowest common ancestor of two chain tips.
    ///
    /// Walks the deeper branch up to equal height, then both in lockstep.
    /// Returns `None` when either tip's work is unknown or a block is
    /// missing mid-walk; hitting the zero parent sentinel resolves to
    /// genesis.
    fn find_common_ancestor(&self, a: Hash, b: Hash) -> Option<Hash> {
        let mut height_a = self.chain_work.get(&a).copied()?;
        let mut height_b = self.chain_work.get(&b).copied()?;
        let mut cursor_a = a;
        let mut cursor_b = b;

        while height_a > height_b {
            cursor_a = self.blocks.get(&cursor_a)?.header.prev_hash;
            height_a -= 1;
        }
        while height_b > height_a {
            cursor_b = self.blocks.get(&cursor_b)?.header.prev_hash;
            height_b -= 1;
        }

        while cursor_a != cursor_b {
            let block_a = self.blocks.get(&cursor_a)?;
            let block_b = self.blocks.get(&cursor_b)?;
            if block_a.header.prev_hash == Hash::ZERO || block_b.header.prev_hash == Hash::ZERO {
                return Some(self.genesis_hash);
            }
            cursor_a = block_a.header.prev_hash;
            cursor_b = block_b.header.prev_hash;
        }
        Some(cursor_a)
    }
}
