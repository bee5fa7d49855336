//! Per-hop gossip delay model.

use powmesh_types::SimConfig;
use rand::Rng;
use std::time::Duration;

/// Samples the one-way delay applied to every gossip hop.
///
/// Delays are uniform over `[delay_min, delay_max)`; a degenerate or
/// inverted range pins every sample to the minimum.
#[derive(Debug, Clone)]
pub struct NetworkModel {
    delay_min: Duration,
    delay_max: Duration,
}

impl NetworkModel {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            delay_min: config.delay_min,
            delay_max: config.delay_max,
        }
    }

    /// Sample the delay for a single hop.
    pub fn sample_delay(&self, rng: &mut impl Rng) -> Duration {
        let min = self.delay_min.as_secs_f64();
        let max = self.delay_max.as_secs_f64();
        if min >= max {
            return self.delay_min;
        }
        Duration::from_secs_f64(rng.gen_range(min..max))
    }
}
