//! Transaction source with normal-distributed sizes.

use powmesh_types::{SimConfig, Transaction, TxId};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

/// Produces up to a configured number of transactions.
///
/// Sizes are drawn from `Normal(mean, stddev)` and clamped into
/// `[min, max]`; a zero (or invalid) standard deviation pins every draw to
/// the mean. Ids are a monotonic sequence plus a random tag.
pub struct TxSource {
    total: u64,
    generated: u64,
    min_size: u64,
    max_size: u64,
    mean_size: f64,
    size_dist: Option<Normal<f64>>,
}

impl TxSource {
    pub fn new(config: &SimConfig) -> Self {
        let size_dist = if config.stddev_tx_size_bytes > 0.0 {
            Normal::new(config.mean_tx_size_bytes, config.stddev_tx_size_bytes).ok()
        } else {
            None
        };
        Self {
            total: config.total_input_txs,
            generated: 0,
            min_size: config.min_tx_size_bytes,
            max_size: config.max_tx_size_bytes,
            mean_size: config.mean_tx_size_bytes,
            size_dist,
        }
    }

    /// Draw the next transaction, or `None` once the cap is reached.
    pub fn next(&mut self, now: Duration, rng: &mut impl Rng) -> Option<Transaction> {
        if self.generated >= self.total {
            return None;
        }
        self.generated += 1;

        let drawn = match &self.size_dist {
            Some(dist) => dist.sample(rng),
            None => self.mean_size,
        };
        let clamped = drawn.clamp(self.min_size as f64, self.max_size as f64);
        let size = clamped.round() as u64;

        let id = TxId {
            seq: self.generated,
            tag: rng.gen_range(0..1_000_000),
        };
        Some(Transaction::new(id, now, size))
    }

    /// Number of transactions produced so far.
    pub fn generated_count(&self) -> u64 {
        self.generated
    }

    /// Whether the source has hit its cap.
    pub fn is_exhausted(&self) -> bool {
        self.generated >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config(total: u64) -> SimConfig {
        SimConfig {
            total_input_txs: total,
            min_tx_size_bytes: 100,
            max_tx_size_bytes: 600,
            mean_tx_size_bytes: 300.0,
            stddev_tx_size_bytes: 150.0,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_produces_exactly_the_cap() {
        let mut source = TxSource::new(&config(5));
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let mut produced = 0;
        while source.next(Duration::ZERO, &mut rng).is_some() {
            produced += 1;
        }
        assert_eq!(produced, 5);
        assert_eq!(source.generated_count(), 5);
        assert!(source.is_exhausted());
        assert!(source.next(Duration::ZERO, &mut rng).is_none());
    }

    #[test]
    fn test_sizes_are_clamped() {
        let mut source = TxSource::new(&config(1000));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        while let Some(tx) = source.next(Duration::ZERO, &mut rng) {
            assert!(tx.size >= 100, "size {} below clamp", tx.size);
            assert!(tx.size <= 600, "size {} above clamp", tx.size);
        }
    }

    #[test]
    fn test_zero_stddev_pins_to_mean() {
        let mut source = TxSource::new(&SimConfig {
            stddev_tx_size_bytes: 0.0,
            ..config(10)
        });
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        while let Some(tx) = source.next(Duration::ZERO, &mut rng) {
            assert_eq!(tx.size, 300);
        }
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let mut source = TxSource::new(&config(10));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut expected = 1;
        while let Some(tx) = source.next(Duration::ZERO, &mut rng) {
            assert_eq!(tx.id.seq, expected);
            expected += 1;
        }
    }

    #[test]
    fn test_timestamp_is_injection_time() {
        let mut source = TxSource::new(&config(1));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let now = Duration::from_secs(42);
        let tx = source.next(now, &mut rng).unwrap();
        assert_eq!(tx.injected_at, now);
    }
}
