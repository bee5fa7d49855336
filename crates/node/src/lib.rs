//! Per-node state machine for the powmesh simulator.
//!
//! A [`NodeState`] holds one participant's view of the network: its block
//! DAG, mempool, orphan pool, and mining job. Handlers are synchronous and
//! deterministic; they mutate the node and return
//! [`Action`](powmesh_core::Action)s for the runner to execute. Nodes never
//! hold a reference back to the kernel.
//!
//! Handler entry points, one per event kind addressed to a node:
//!
//! - [`NodeState::receive_transaction`]: dedup, mempool admission, mining
//!   trigger, relay
//! - [`NodeState::attempt_mining`]: stale-guarded candidate assembly and
//!   find-time draw
//! - [`NodeState::block_found`]: job-identity check, resolution, self-receive
//! - [`NodeState::receive_block`]: validation, orphan parking/replay, fork
//!   choice, reorg

mod blocks;
mod mining;
mod state;
mod stats;

pub use state::NodeState;
pub use stats::NodeStats;
