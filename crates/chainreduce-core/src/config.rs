//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Per-deployment configuration for a reduction engine instance.
///
/// `confirmation_depth` is chain-specific and directly controls both the
/// retained-history size and the revert-safety window; document the value per
/// chain when deploying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceConfig {
    /// Blocks that must pass on top of a block before its events are treated
    /// as practically irreversible.
    /// Typical values: 12 (Ethereum PoS), 32 (Polygon), 1 (fast-finality chains).
    pub confirmation_depth: u64,
    /// Cap on retained confirmed events per entity. When a family configures
    /// a compaction reducer, the oldest events beyond the cap are folded into
    /// one compacted summary instead of growing without bound.
    pub max_retained_events: usize,
    /// Attempts for the optimistic save loop before giving up.
    pub max_save_attempts: u32,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            confirmation_depth: 12,
            max_retained_events: 100,
            max_save_attempts: 5,
        }
    }
}
