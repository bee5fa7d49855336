//! Simulated transactions.

use std::fmt;
use std::time::Duration;

/// Fixed payload carried by every simulated transaction. Only the declared
/// byte size matters for block packing; the payload itself is opaque.
pub const SIMULATED_PAYLOAD: &str = "simulated payload data";

/// Identifier of an injected transaction.
///
/// `seq` is assigned monotonically by the transaction source; `tag` is a
/// random disambiguator. Displays as `tx-<seq>-<tag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId {
    pub seq: u64,
    pub tag: u32,
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}-{}", self.seq, self.tag)
    }
}

/// An immutable simulated transaction.
///
/// `size` is the declared wire size in bytes, clamped by the source to the
/// configured `[min_tx_size_bytes, max_tx_size_bytes]` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TxId,
    /// Virtual time the source produced this transaction.
    pub injected_at: Duration,
    pub payload: &'static str,
    pub size: u64,
}

impl Transaction {
    pub fn new(id: TxId, injected_at: Duration, size: u64) -> Self {
        Self {
            id,
            injected_at,
            payload: SIMULATED_PAYLOAD,
            size,
        }
    }
}
