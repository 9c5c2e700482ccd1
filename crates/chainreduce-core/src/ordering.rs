//! Ordering and finality primitives shared by every reduced entity.

use serde::{Deserialize, Serialize};

// ─── OrderingKey ──────────────────────────────────────────────────────────────

/// Total order over events within one entity's history.
///
/// Block number is monotonic only within a confirmed chain; the log index and
/// minor log index break ties for events emitted in the same block (the minor
/// index distinguishes several interpreted effects of one raw log).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OrderingKey {
    /// Block number the log was emitted in.
    pub block_number: u64,
    /// Log index within the block.
    pub log_index: u32,
    /// Minor log index within the interpreted log.
    pub minor_log_index: u32,
}

impl OrderingKey {
    pub fn new(block_number: u64, log_index: u32, minor_log_index: u32) -> Self {
        Self {
            block_number,
            log_index,
            minor_log_index,
        }
    }
}

impl std::fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.block_number, self.log_index, self.minor_log_index
        )
    }
}

// ─── EventStatus ──────────────────────────────────────────────────────────────

/// Finality tag on an event. The payload of an event never changes; only its
/// status does as the chain behind it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Seen in the mempool, not yet mined.
    Pending,
    /// Mined into the canonical chain.
    Confirmed,
    /// Invalidated by a chain reorganization.
    Reverted,
    /// A pending event that will never be mined (dropped from the mempool).
    Inactive,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Reverted => write!(f, "reverted"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_key_total_order() {
        let a = OrderingKey::new(10, 0, 0);
        let b = OrderingKey::new(10, 1, 0);
        let c = OrderingKey::new(10, 1, 2);
        let d = OrderingKey::new(11, 0, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
        assert_eq!(b, OrderingKey::new(10, 1, 0));
    }

    #[test]
    fn ordering_key_display() {
        assert_eq!(OrderingKey::new(12, 3, 1).to_string(), "12:3:1");
    }
}
