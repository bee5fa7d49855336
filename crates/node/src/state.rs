//! Node state and transaction reception.

use crate::NodeStats;
use powmesh_core::{Action, JobId, NodeIndex};
use powmesh_types::{Block, Hash, SimConfig, Transaction, TxId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One participant's complete view of the network.
pub struct NodeState {
    pub(crate) index: NodeIndex,
    pub(crate) is_miner: bool,
    /// Random mesh neighbours built at setup. Relay floods to all nodes;
    /// the mesh is kept for reporting.
    peers: Vec<NodeIndex>,
    pub(crate) config: Arc<SimConfig>,
    /// Virtual time, set by the runner before each handler call.
    pub(crate) now: Duration,
    pub(crate) genesis_hash: Hash,

    /// Transactions seen but not yet in a best-path block. Ordered so that
    /// candidate assembly iterates deterministically before the shuffle.
    pub(crate) mempool: BTreeMap<TxId, Transaction>,
    /// Transaction ids ever observed; the dedup filter that stops flooding.
    pub(crate) known_tx: HashSet<TxId>,
    /// Block hashes marked known opportunistically on acceptance.
    pub(crate) known_hashes: HashSet<Hash>,

    /// Every block this node has validated, by content hash.
    pub(crate) blocks: HashMap<Hash, Arc<Block>>,
    /// Accepted block hashes grouped by height; side branches make a height
    /// hold more than one entry.
    pub(crate) blocks_at_height: HashMap<u64, Vec<Hash>>,
    /// Cumulative work per block. Each block is worth one unit, so work
    /// equals height.
    pub(crate) chain_work: HashMap<Hash, u64>,
    /// Hash of the highest-work block this node considers canonical.
    pub(crate) best_tip: Hash,
    /// Parked blocks keyed by the parent hash they are waiting for.
    pub(crate) orphans: HashMap<Hash, Vec<Arc<Block>>>,

    /// Active block-found job, compared by id at dispatch time.
    pub(crate) current_job: Option<JobId>,
    /// True while the mempool is below the mining threshold.
    pub(crate) waiting_for_mempool: bool,
    pub(crate) job_seq: u64,

    pub stats: NodeStats,
}

impl NodeState {
    /// Create a node seeded with the genesis block.
    pub fn new(
        index: NodeIndex,
        is_miner: bool,
        genesis: Arc<Block>,
        config: Arc<SimConfig>,
    ) -> Self {
        let genesis_hash = genesis.hash;
        let mut blocks = HashMap::new();
        blocks.insert(genesis_hash, genesis);
        let mut blocks_at_height = HashMap::new();
        blocks_at_height.insert(0, vec![genesis_hash]);
        let mut chain_work = HashMap::new();
        chain_work.insert(genesis_hash, 0);
        let mut known_hashes = HashSet::new();
        known_hashes.insert(genesis_hash);

        Self {
            index,
            is_miner,
            peers: Vec::new(),
            config,
            now: Duration::ZERO,
            genesis_hash,
            mempool: BTreeMap::new(),
            known_tx: HashSet::new(),
            known_hashes,
            blocks,
            blocks_at_height,
            chain_work,
            best_tip: genesis_hash,
            orphans: HashMap::new(),
            current_job: None,
            waiting_for_mempool: is_miner,
            job_seq: 0,
            stats: NodeStats::default(),
        }
    }

    /// Set the current virtual time. Called by the runner before each
    /// handler dispatch.
    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    /// Handle a transaction delivered to this node.
    ///
    /// Duplicates are dropped (this is what terminates flooding). A newly
    /// admitted transaction is re-broadcast, and may wake an idle miner
    /// whose mempool just crossed the packing threshold.
    pub fn receive_transaction(&mut self, tx: Arc<Transaction>) -> Vec<Action> {
        self.stats.received_tx += 1;
        if self.known_tx.contains(&tx.id) {
            return Vec::new();
        }

        self.known_tx.insert(tx.id);
        self.mempool.insert(tx.id, (*tx).clone());
        self.stats.added_to_mempool += 1;

        let mut actions = Vec::new();
        if self.is_miner
            && self.waiting_for_mempool
            && self.current_job.is_none()
            && self.can_attempt_mining()
        {
            debug!(
                node = self.index,
                tx = %tx.id,
                "mempool reached packing threshold, triggering mining attempt"
            );
            actions.push(self.mining_attempt_action());
            self.waiting_for_mempool = false;
        }

        actions.push(Action::BroadcastTransaction(tx));
        actions
    }

    // ─── Accessors ───

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn is_miner(&self) -> bool {
        self.is_miner
    }

    pub fn add_peer(&mut self, peer: NodeIndex) {
        if !self.peers.contains(&peer) {
            self.peers.push(peer);
        }
    }

    pub fn peers(&self) -> &[NodeIndex] {
        &self.peers
    }

    pub fn best_tip(&self) -> Hash {
        self.best_tip
    }

    /// Height (work) of the current best tip.
    pub fn tip_height(&self) -> u64 {
        self.chain_work.get(&self.best_tip).copied().unwrap_or(0)
    }

    pub fn block(&self, hash: &Hash) -> Option<&Arc<Block>> {
        self.blocks.get(hash)
    }

    pub fn chain_work(&self, hash: &Hash) -> Option<u64> {
        self.chain_work.get(hash).copied()
    }

    /// Accepted block hashes at a height (more than one means a fork).
    pub fn blocks_at_height(&self, height: u64) -> &[Hash] {
        self.blocks_at_height
            .get(&height)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Hashes of every validated block, in no particular order.
    pub fn block_hashes(&self) -> impl Iterator<Item = &Hash> + '_ {
        self.blocks.keys()
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.len()
    }

    pub fn mempool_contains(&self, id: &TxId) -> bool {
        self.mempool.contains_key(id)
    }

    /// Parked orphans waiting for the given parent hash.
    pub fn orphans_waiting_for(&self, parent: &Hash) -> usize {
        self.orphans.get(parent).map(Vec::len).unwrap_or(0)
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.current_job
    }

    pub fn is_waiting_for_mempool(&self) -> bool {
        self.waiting_for_mempool
    }
}
