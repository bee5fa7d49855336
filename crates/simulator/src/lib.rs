//! Powmesh Simulator
//!
//! The outer layer around `powmesh-simulation`: end-of-run analysis of the
//! chains the nodes built, plus the `powmesh-sim` CLI binary.
//!
//! The report functions only read the post-run surface of the runner
//! (tips, block maps, counters); the simulation itself has already ended
//! and a report failure is never fatal to it.

pub mod report;

pub use report::{
    average_block_interval, block_throughput, chain_lines, check_consensus, main_chain,
    side_branches, ConsensusReport, ReportError,
};
