//! Core types for the powmesh simulator.
//!
//! This crate provides the foundational data model shared by every other
//! crate in the workspace:
//!
//! - [`Hash`]: content-addressed block identifier (SHA-256)
//! - [`TxId`] / [`Transaction`]: injected workload items
//! - [`BlockHeader`] / [`Block`]: the chain data structure
//! - [`SimConfig`]: every tunable knob, with validation

mod block;
mod config;
mod hash;
mod transaction;

pub use block::{Block, BlockHeader};
pub use config::{ConfigError, SimConfig};
pub use hash::Hash;
pub use transaction::{Transaction, TxId};

/// Index of a node within the simulation.
///
/// This is a simulation-only addressing concept: nodes live in a dense
/// vector owned by the runner and events route by index.
pub type NodeIndex = u32;
