//! Error types for the reduction engine.

use thiserror::Error;

use crate::ordering::OrderingKey;

/// Errors that can occur while reducing an entity.
#[derive(Debug, Error)]
pub enum ReduceError {
    /// Optimistic write collided with a concurrent update of the same key.
    /// Recovered locally by re-read-and-retry.
    #[error("version conflict for entity '{entity_id}': expected {expected}, found {found}")]
    VersionConflict {
        entity_id: String,
        expected: u64,
        found: u64,
    },

    #[error("ordering violation: {0}")]
    OrderingViolation(String),

    /// A revert arrived for history already forgotten past the confirmation
    /// depth — either a misconfigured depth or a reorg deeper than the safety
    /// margin. Downstream consumers may have observed the invalidated state.
    #[error("revert of event {key} is {depth} blocks below the newest confirmed event, deeper than the safety window")]
    RevertedTooDeep { key: OrderingKey, depth: u64 },

    /// A reducer received an event variant it does not recognize.
    #[error("unsupported event payload: {0}")]
    UnsupportedPayload(String),

    #[error("value underflow while reducing event {key}: {amount} exceeds current {current}")]
    ValueUnderflow {
        key: OrderingKey,
        current: u128,
        amount: u128,
    },

    #[error("value overflow while reducing event {key}")]
    ValueOverflow { key: OrderingKey },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("change listener '{listener}' failed: {reason}")]
    Listener { listener: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl ReduceError {
    /// Returns `true` for transient optimistic-write collisions (retryable).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` for consistency errors that must stop processing for
    /// the affected key and alert, rather than be retried or skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OrderingViolation(_)
                | Self::RevertedTooDeep { .. }
                | Self::UnsupportedPayload(_)
                | Self::ValueUnderflow { .. }
                | Self::ValueOverflow { .. }
        )
    }
}
