//! Deterministic simulation kernel.
//!
//! This crate provides the event-driven core of the simulator. Given the
//! same seed and configuration, a run produces identical results every time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, Event>)        │ │
//! │  │     Ordered by: time, priority, sequence           │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     nodes: Vec<NodeState>                          │ │
//! │  │     Each handler runs to completion                │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Actions → fan-out, scheduling, bookkeeping     │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod event_queue;
mod network;
mod runner;
mod tx_source;

pub use network::NetworkModel;
pub use runner::{SimulationRunner, SimulationStats, StopReason, TxStatusEntry};
pub use tx_source::TxSource;
