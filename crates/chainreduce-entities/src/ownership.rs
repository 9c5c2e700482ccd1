//! Ownership family: one entity per (token, token id, owner), tracking how
//! many units of an item an address holds.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainreduce_core::{
    add_value, sub_value, Entity, EntityEvent, EventLog, EventStatus, EventStatusRouter,
    InvertingReducer, OrderingKey, Reducer, ReduceConfig, ReduceError, ReducerPipeline,
    RetainedEvent,
};

// ─── Identity ─────────────────────────────────────────────────────────────────

/// Identifier of one ownership record: (token contract, token id, owner).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnershipId {
    pub token: String,
    pub token_id: String,
    pub owner: String,
}

impl OwnershipId {
    pub fn new(
        token: impl Into<String>,
        token_id: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            token_id: token_id.into(),
            owner: owner.into(),
        }
    }
}

impl fmt::Display for OwnershipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.token, self.token_id, self.owner)
    }
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// Semantic effect of one interpreted log on an ownership record. Mints and
/// burns arrive as transfers from/to the zero address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OwnershipPayload {
    /// `value` units received from `from`.
    TransferTo { value: u128, from: String },
    /// `value` units sent to `to`.
    TransferFrom { value: u128, to: String },
    /// Lazy-minted units assigned to this owner.
    LazyTransferTo { value: u128 },
    /// Lazy-minted units leaving this owner (minted for real or withdrawn).
    LazyTransferFrom { value: u128 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipEvent {
    pub log: EventLog,
    pub ownership_id: OwnershipId,
    pub payload: OwnershipPayload,
}

impl EntityEvent for OwnershipEvent {
    type EntityId = OwnershipId;

    fn entity_id(&self) -> OwnershipId {
        self.ownership_id.clone()
    }

    fn ordering_key(&self) -> OrderingKey {
        self.log.key
    }

    fn status(&self) -> EventStatus {
        self.log.status
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.log.timestamp
    }
}

impl OwnershipEvent {
    fn invert(&self) -> Self {
        let payload = match self.payload.clone() {
            OwnershipPayload::TransferTo { value, from } => {
                OwnershipPayload::TransferFrom { value, to: from }
            }
            OwnershipPayload::TransferFrom { value, to } => {
                OwnershipPayload::TransferTo { value, from: to }
            }
            OwnershipPayload::LazyTransferTo { value } => {
                OwnershipPayload::LazyTransferFrom { value }
            }
            OwnershipPayload::LazyTransferFrom { value } => {
                OwnershipPayload::LazyTransferTo { value }
            }
        };
        Self {
            payload,
            ..self.clone()
        }
    }
}

// ─── Entity ───────────────────────────────────────────────────────────────────

/// Materialized ownership snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ownership {
    pub id: OwnershipId,
    pub value: u128,
    pub lazy_value: u128,
    /// Logically deleted: this address no longer holds any units.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub version: u64,
    pub retained: Vec<RetainedEvent<OwnershipEvent>>,
}

impl Entity for Ownership {
    type Event = OwnershipEvent;

    fn id(&self) -> OwnershipId {
        self.id.clone()
    }

    fn template(id: &OwnershipId) -> Self {
        Self {
            id: id.clone(),
            value: 0,
            lazy_value: 0,
            deleted: true,
            created_at: DateTime::<Utc>::MIN_UTC,
            last_updated_at: DateTime::<Utc>::MIN_UTC,
            version: 0,
            retained: Vec::new(),
        }
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn retained(&self) -> &[RetainedEvent<OwnershipEvent>] {
        &self.retained
    }

    fn set_retained(&mut self, retained: Vec<RetainedEvent<OwnershipEvent>>) {
        self.retained = retained;
    }
}

// ─── Reducers ─────────────────────────────────────────────────────────────────

/// Applies confirmed holdings changes.
struct OwnershipValueReducer;

impl Reducer<Ownership> for OwnershipValueReducer {
    fn reduce(
        &self,
        mut entity: Ownership,
        event: &OwnershipEvent,
    ) -> Result<Ownership, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        let key = event.ordering_key();
        match &event.payload {
            OwnershipPayload::TransferTo { value, .. } => {
                entity.value = add_value(entity.value, *value, key)?;
            }
            OwnershipPayload::TransferFrom { value, .. } => {
                entity.value = sub_value(entity.value, *value, key)?;
            }
            OwnershipPayload::LazyTransferTo { value } => {
                entity.lazy_value = add_value(entity.lazy_value, *value, key)?;
            }
            OwnershipPayload::LazyTransferFrom { value } => {
                entity.lazy_value = sub_value(entity.lazy_value, *value, key)?;
            }
        }
        Ok(entity)
    }
}

/// Stamps dates and the logical-deletion flag.
struct OwnershipCalculatedReducer;

impl Reducer<Ownership> for OwnershipCalculatedReducer {
    fn reduce(
        &self,
        mut entity: Ownership,
        event: &OwnershipEvent,
    ) -> Result<Ownership, ReduceError> {
        if entity.created_at == DateTime::<Utc>::MIN_UTC {
            entity.created_at = event.timestamp();
        }
        entity.last_updated_at = event.timestamp();
        entity.deleted = entity.value == 0 && entity.lazy_value == 0;
        Ok(entity)
    }
}

/// Build the ownership family router over the shared engine. Ownership
/// histories are short-lived, so no compaction is configured.
pub fn ownership_router(config: &ReduceConfig) -> EventStatusRouter<Ownership> {
    let forward = ReducerPipeline::new()
        .with(OwnershipValueReducer)
        .with(OwnershipCalculatedReducer);
    let reversed = ReducerPipeline::new()
        .with(InvertingReducer::new(
            Box::new(OwnershipValueReducer),
            |event: &OwnershipEvent| event.invert(),
        ))
        .with(OwnershipCalculatedReducer);
    EventStatusRouter::new(forward, reversed, None, config)
}
