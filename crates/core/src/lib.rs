//! Event and action model for the powmesh simulator.
//!
//! The simulator is built on a simple event-driven model:
//!
//! ```text
//! Events → NodeState handlers → Actions
//! ```
//!
//! Node handlers are:
//! - **Synchronous**: no async, no `.await`
//! - **Deterministic**: same state + event + RNG stream = same actions
//! - **I/O free**: scheduling, fan-out, and global bookkeeping are performed
//!   by the runner executing the returned [`Action`]s
//!
//! [`Action`]: crate::Action

mod action;
mod event;

pub use action::Action;
pub use event::Event;

pub use powmesh_types::NodeIndex;

/// Identifier of a miner's in-flight block-found job.
///
/// Monotonic per miner. A queued `BlockFound` event is accepted only when the
/// miner's active job id still matches; a tip move invalidates the job by
/// clearing the id, never by removing the event from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);
