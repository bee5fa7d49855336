//! Mining policy: threshold checks, candidate assembly, job lifecycle.

use crate::NodeState;
use powmesh_core::{Action, JobId};
use powmesh_types::{Block, Hash, SimConfig, Transaction};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, trace};

/// A miner starts an attempt only once the mempool holds at least this
/// fraction of the block size limit.
const MINING_THRESHOLD: f64 = 0.95;

impl NodeState {
    /// Whether this miner's mempool meets the packing threshold.
    ///
    /// Vacuously true when the configured limit makes the required byte
    /// count non-positive.
    pub(crate) fn can_attempt_mining(&self) -> bool {
        if !self.is_miner {
            return false;
        }
        let required = self.config.block_size_limit_bytes as f64 * MINING_THRESHOLD;
        if required <= 0.0 {
            return true;
        }
        let pooled: u64 = self.mempool.values().map(|tx| tx.size).sum();
        pooled as f64 >= required
    }

    /// Build the action that queues an `AttemptMining` on the current tip.
    pub(crate) fn mining_attempt_action(&self) -> Action {
        let parent = self.best_tip;
        let height = self.tip_height() + 1;
        debug!(
            node = self.index,
            height,
            parent = %parent.short(),
            "scheduling mining attempt"
        );
        Action::ScheduleMiningAttempt { parent, height }
    }

    /// Handle a dispatched `AttemptMining`.
    ///
    /// The recorded parent and height are re-validated against the current
    /// tip; an attempt that raced a better block is dropped silently. A live
    /// attempt packs a shuffled subset of the mempool, draws a find time,
    /// and registers the block-found job unless it would resolve past the
    /// simulation duration.
    pub fn attempt_mining(
        &mut self,
        parent: Hash,
        height: u64,
        rng: &mut impl Rng,
    ) -> Vec<Action> {
        if !self.is_miner {
            return Vec::new();
        }
        if parent != self.best_tip || height != self.tip_height() + 1 {
            trace!(node = self.index, height, "stale mining attempt dropped");
            return Vec::new();
        }

        self.stats.mining_attempts += 1;

        // Uniform random packing: shuffle, then greedily take what fits.
        // Fee priority is not modeled.
        let mut candidates: Vec<Transaction> = self.mempool.values().cloned().collect();
        candidates.shuffle(rng);

        let limit = self.config.block_size_limit_bytes;
        let mut selected = Vec::new();
        let mut packed_bytes = 0u64;
        for tx in candidates {
            if packed_bytes + tx.size <= limit {
                packed_bytes += tx.size;
                selected.push(tx);
            }
        }

        debug!(
            node = self.index,
            height,
            parent = %parent.short(),
            selected = selected.len(),
            packed_bytes,
            limit,
            "starting mining calculation"
        );

        let block = Block::new(height, parent, self.now, self.index, selected);
        let found_at = self.now + sample_find_time(&self.config, rng);

        if found_at >= self.config.duration {
            // Would resolve after the run ends; never schedule it.
            self.current_job = None;
            return Vec::new();
        }

        self.job_seq += 1;
        let job = JobId(self.job_seq);
        self.current_job = Some(job);
        vec![Action::ScheduleBlockFound {
            found_at,
            block,
            job,
        }]
    }

    /// Handle a dispatched `BlockFound`.
    ///
    /// Only honored while `job` is still this miner's active job; a tip move
    /// in the meantime cleared it and the event dies here. On a match the
    /// block resolves at the event timestamp and is fed through this node's
    /// own receive path.
    pub fn block_found(&mut self, block: Block, job: JobId) -> Vec<Action> {
        if !self.is_miner {
            return Vec::new();
        }
        if self.current_job != Some(job) {
            trace!(node = self.index, job = job.0, "stale block-found job discarded");
            return Vec::new();
        }

        self.current_job = None;
        self.stats.mined_blocks += 1;

        let mut block = block;
        block.found_time = Some(self.now);

        debug!(
            node = self.index,
            height = block.header.height,
            hash = %block.hash.short(),
            txs = block.header.tx_count,
            "mined block"
        );

        let mut actions = vec![Action::RecordInclusion {
            block: block.hash,
            found_time: self.now,
            tx_ids: block.transactions.iter().map(|tx| tx.id).collect(),
        }];
        actions.extend(self.receive_block(std::sync::Arc::new(block)));
        actions
    }

    /// Re-arm mining after this node's best tip advanced.
    ///
    /// Clears any outstanding job (invalidating its queued `BlockFound` via
    /// the id check) and either schedules a fresh attempt or goes back to
    /// waiting for mempool volume.
    pub(crate) fn restart_mining(&mut self) -> Vec<Action> {
        if !self.is_miner {
            return Vec::new();
        }

        self.current_job = None;
        self.waiting_for_mempool = false;

        if self.can_attempt_mining() {
            vec![self.mining_attempt_action()]
        } else {
            debug!(
                node = self.index,
                "mempool below packing threshold after tip update, waiting"
            );
            self.waiting_for_mempool = true;
            Vec::new()
        }
    }
}

/// Draw a block find time uniformly from the configured interval.
/// Degenerates to the minimum when the interval is empty or inverted.
fn sample_find_time(config: &SimConfig, rng: &mut impl Rng) -> Duration {
    let min = config.find_time_min.as_secs_f64();
    let max = config.find_time_max.as_secs_f64();
    if max <= min {
        return config.find_time_min;
    }
    Duration::from_secs_f64(rng.gen_range(min..max))
}
