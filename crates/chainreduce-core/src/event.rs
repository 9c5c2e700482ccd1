//! Event and entity abstractions over which the engine is generic.

use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ordering::{EventStatus, OrderingKey};

// ─── EventLog ─────────────────────────────────────────────────────────────────

/// The on-chain envelope shared by every interpreted log event.
///
/// Domain event types embed one of these next to their typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    /// Finality of the log at the time it was delivered.
    pub status: EventStatus,
    /// Position of the log in the entity's history.
    pub key: OrderingKey,
    /// Contract address that emitted the log (`0x…`).
    pub address: String,
    /// Transaction hash (`0x…`).
    pub tx_hash: String,
    /// Block (or mempool-seen) timestamp.
    pub timestamp: DateTime<Utc>,
}

impl EventLog {
    pub fn new(
        status: EventStatus,
        key: OrderingKey,
        address: impl Into<String>,
        tx_hash: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            key,
            address: address.into(),
            tx_hash: tx_hash.into(),
            timestamp,
        }
    }

    /// Copy of this envelope with a different status (confirmation, revert).
    pub fn with_status(&self, status: EventStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

// ─── EntityEvent / Entity ─────────────────────────────────────────────────────

/// One interpreted blockchain log bound to an entity stream.
pub trait EntityEvent: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Stable identifier of the entity this event belongs to.
    type EntityId: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn entity_id(&self) -> Self::EntityId;
    fn ordering_key(&self) -> OrderingKey;
    fn status(&self) -> EventStatus;
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A materialized current-state snapshot for one entity key.
///
/// The entity's domain fields are always exactly the fold of its retained
/// event history (plus forgotten finalized history), applied in ordering-key
/// order through the family's reducer pipeline, starting from [`Entity::template`].
/// Entities are mutated exclusively by the reduction engine.
pub trait Entity: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    type Event: EntityEvent;

    fn id(&self) -> <Self::Event as EntityEvent>::EntityId;

    /// The zero-valued snapshot a new entity starts from.
    fn template(id: &<Self::Event as EntityEvent>::EntityId) -> Self;

    /// Monotonic token for optimistic concurrency control.
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);

    /// The subset of history kept so a future revert can be undone locally.
    fn retained(&self) -> &[RetainedEvent<Self::Event>];
    fn set_retained(&mut self, retained: Vec<RetainedEvent<Self::Event>>);
}

// ─── RetainedEvent ────────────────────────────────────────────────────────────

/// One retained-history entry: a plain event, or a compacted summary standing
/// in for several finalized events that were folded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedEvent<E> {
    pub event: E,
    /// Ordering keys of the events folded into this entry, oldest first.
    /// Empty for plain (non-compacted) entries. Keeping the individual keys
    /// lets a revert of compacted history locate its target and stay
    /// idempotent under redelivery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compacted: Vec<OrderingKey>,
}

impl<E: EntityEvent> RetainedEvent<E> {
    pub fn plain(event: E) -> Self {
        Self {
            event,
            compacted: Vec::new(),
        }
    }

    pub fn key(&self) -> OrderingKey {
        self.event.ordering_key()
    }

    pub fn status(&self) -> EventStatus {
        self.event.status()
    }

    pub fn is_compacted(&self) -> bool {
        !self.compacted.is_empty()
    }

    /// Whether this entry stands for `key`. A compacted entry keeps the
    /// newest constituent's key on its summary event even after that
    /// constituent is reverted out, so coverage is decided by the folded-key
    /// list alone.
    pub fn covers(&self, key: OrderingKey) -> bool {
        if self.is_compacted() {
            self.compacted.contains(&key)
        } else {
            self.key() == key
        }
    }
}
