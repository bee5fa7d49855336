//! Simulation configuration.

use std::time::Duration;

/// Every tunable knob of a simulation run.
///
/// Defaults model a small Bitcoin-like network: 20 nodes, 5 miners, 1 MiB
/// blocks, a ~10 minute find time, and sub-second gossip delays.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Total number of nodes to create.
    pub num_nodes: u32,
    /// Number of mining nodes. Must not exceed `num_nodes`.
    pub num_miners: u32,
    /// Hard cap on the packed byte size of a block.
    pub block_size_limit_bytes: u64,
    /// Transaction injection rate per virtual second. 0 disables injection.
    pub tx_rate_per_sec: f64,

    /// Lower clamp for drawn transaction sizes.
    pub min_tx_size_bytes: u64,
    /// Upper clamp for drawn transaction sizes.
    pub max_tx_size_bytes: u64,
    /// Mean of the normal size distribution.
    pub mean_tx_size_bytes: f64,
    /// Standard deviation of the normal size distribution. 0 pins every
    /// draw to the mean.
    pub stddev_tx_size_bytes: f64,

    /// Minimum per-hop gossip delay.
    pub delay_min: Duration,
    /// Maximum per-hop gossip delay.
    pub delay_max: Duration,

    /// Cap on the number of transactions the source will produce.
    pub total_input_txs: u64,
    /// Virtual wall-clock cap on the run.
    pub duration: Duration,

    /// Lower bound of the uniform block find-time draw.
    pub find_time_min: Duration,
    /// Upper bound of the uniform block find-time draw.
    pub find_time_max: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_nodes: 20,
            num_miners: 5,
            block_size_limit_bytes: 1024 * 1024,
            tx_rate_per_sec: 4.0,
            min_tx_size_bytes: 100,
            max_tx_size_bytes: 600,
            mean_tx_size_bytes: 300.0,
            stddev_tx_size_bytes: 150.0,
            delay_min: Duration::from_millis(100),
            delay_max: Duration::from_millis(500),
            total_input_txs: 20_000,
            duration: Duration::from_secs(3600),
            find_time_min: Duration::from_secs(600),
            find_time_max: Duration::from_secs(660),
        }
    }
}

impl SimConfig {
    /// Target interval between blocks, derived from the find-time bounds.
    pub fn target_block_interval(&self) -> Duration {
        (self.find_time_min + self.find_time_max) / 2
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_miners > self.num_nodes {
            return Err(ConfigError::MinersExceedNodes {
                miners: self.num_miners,
                nodes: self.num_nodes,
            });
        }
        if self.delay_min > self.delay_max {
            return Err(ConfigError::DelayRange {
                min: self.delay_min,
                max: self.delay_max,
            });
        }
        if self.duration.is_zero() {
            return Err(ConfigError::NonPositiveDuration);
        }
        if self.block_size_limit_bytes == 0 {
            return Err(ConfigError::NonPositiveBlockSize);
        }
        if self.min_tx_size_bytes == 0 {
            return Err(ConfigError::NonPositiveMinTxSize);
        }
        if self.max_tx_size_bytes < self.min_tx_size_bytes {
            return Err(ConfigError::TxSizeRange {
                min: self.min_tx_size_bytes,
                max: self.max_tx_size_bytes,
            });
        }
        Ok(())
    }
}

/// Configuration rejected before the run starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("number of miners ({miners}) cannot exceed number of nodes ({nodes})")]
    MinersExceedNodes { miners: u32, nodes: u32 },

    #[error("minimum network delay ({min:?}) cannot exceed maximum ({max:?})")]
    DelayRange { min: Duration, max: Duration },

    #[error("simulation duration must be positive")]
    NonPositiveDuration,

    #[error("block size limit must be positive")]
    NonPositiveBlockSize,

    #[error("minimum transaction size must be positive")]
    NonPositiveMinTxSize,

    #[error("maximum transaction size ({max}) cannot be less than minimum ({min})")]
    TxSizeRange { min: u64, max: u64 },
}
