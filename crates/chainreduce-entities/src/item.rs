//! NFT item family: one entity per (token, token id), tracking minted and
//! lazy supply, creators, and logical deletion.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainreduce_core::{
    add_value, sub_value, CompactionReducer, Entity, EntityEvent, EventLog, EventStatus,
    EventStatusRouter, OrderingKey, Reducer, ReduceConfig, ReduceError, ReducerPipeline,
    RetainedEvent,
};

// ─── Identity ─────────────────────────────────────────────────────────────────

/// Identifier of one item: (token contract, token id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId {
    pub token: String,
    pub token_id: String,
}

impl ItemId {
    pub fn new(token: impl Into<String>, token_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_id: token_id.into(),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.token, self.token_id)
    }
}

/// Creator/royalty share: account plus basis-points part value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub account: String,
    pub value: u32,
}

impl Part {
    /// A single creator owning the full part.
    pub fn full(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            value: 10_000,
        }
    }
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// Semantic effect of one interpreted log on an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemPayload {
    /// `supply` units minted to `owner`; `lazy` of them consume previously
    /// lazy-minted supply (stamped by the interpreter, 0 for plain mints).
    Mint {
        supply: u128,
        lazy: u128,
        owner: String,
    },
    /// `supply` units burned by `owner`.
    Burn { supply: u128, owner: String },
    /// Item-level record of a transfer; supply is unaffected (the ownership
    /// family tracks holders).
    Transfer {
        value: u128,
        from: String,
        to: String,
    },
    /// Off-chain lazy mint: adds lazy supply and declares creators.
    LazyMint { supply: u128, creators: Vec<Part> },
    /// Lazy supply withdrawn without minting.
    LazyBurn { supply: u128 },
    /// Creator set changed; `previous` is the set this change replaced.
    Creators {
        creators: Vec<Part>,
        previous: Vec<Part>,
    },
    /// Net effect of compacted supply history. Produced only by compaction.
    Compacted {
        minted: u128,
        burned: u128,
        lazy_minted: u128,
        lazy_burned: u128,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEvent {
    pub log: EventLog,
    pub item_id: ItemId,
    pub payload: ItemPayload,
}

impl EntityEvent for ItemEvent {
    type EntityId = ItemId;

    fn entity_id(&self) -> ItemId {
        self.item_id.clone()
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

impl ItemEvent {
    /// (minted, burned, lazy_minted, lazy_burned) contribution to a compacted
    /// summary. Transfers and creator changes carry their own undo data and
    /// contribute nothing.
    fn flow(&self) -> (u128, u128, u128, u128) {
        match &self.payload {
            ItemPayload::Mint { supply, lazy, .. } => (*supply, 0, 0, *lazy),
            ItemPayload::Burn { supply, .. } => (0, *supply, 0, 0),
            ItemPayload::Transfer { .. } | ItemPayload::Creators { .. } => (0, 0, 0, 0),
            ItemPayload::LazyMint { supply, .. } => (0, 0, *supply, 0),
            ItemPayload::LazyBurn { supply } => (0, 0, 0, *supply),
            ItemPayload::Compacted {
                minted,
                burned,
                lazy_minted,
                lazy_burned,
            } => (*minted, *burned, *lazy_minted, *lazy_burned),
        }
    }
}

// ─── Entity ───────────────────────────────────────────────────────────────────

/// Materialized item snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub supply: u128,
    pub lazy_supply: u128,
    pub creators: Vec<Part>,
    /// Logically deleted: no minted and no lazy supply remains.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub version: u64,
    pub retained: Vec<RetainedEvent<ItemEvent>>,
}

impl Entity for Item {
    type Event = ItemEvent;

    fn id(&self) -> ItemId {
        self.id.clone()
    }

    fn template(id: &ItemId) -> Self {
        Self {
            id: id.clone(),
            supply: 0,
            lazy_supply: 0,
            creators: Vec::new(),
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

    fn retained(&self) -> &[RetainedEvent<ItemEvent>] {
        &self.retained
    }

    fn set_retained(&mut self, retained: Vec<RetainedEvent<ItemEvent>>) {
        self.retained = retained;
    }
}

// ─── Reducers ─────────────────────────────────────────────────────────────────

/// Applies confirmed supply effects. Minting a lazy-minted item converts
/// lazy supply into minted supply.
struct ItemValueReducer;

impl Reducer<Item> for ItemValueReducer {
    fn reduce(&self, mut entity: Item, event: &ItemEvent) -> Result<Item, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        let key = event.ordering_key();
        match &event.payload {
            ItemPayload::Mint { supply, lazy, .. } => {
                entity.supply = add_value(entity.supply, *supply, key)?;
                entity.lazy_supply = sub_value(entity.lazy_supply, *lazy, key)?;
            }
            ItemPayload::Burn { supply, .. } => {
                entity.supply = sub_value(entity.supply, *supply, key)?;
            }
            ItemPayload::Transfer { .. } => {}
            ItemPayload::LazyMint { supply, .. } => {
                entity.lazy_supply = add_value(entity.lazy_supply, *supply, key)?;
            }
            ItemPayload::LazyBurn { supply } => {
                entity.lazy_supply = sub_value(entity.lazy_supply, *supply, key)?;
            }
            ItemPayload::Creators { .. } => {}
            ItemPayload::Compacted {
                minted,
                burned,
                lazy_minted,
                lazy_burned,
            } => {
                entity.supply = add_value(entity.supply, *minted, key)?;
                entity.supply = sub_value(entity.supply, *burned, key)?;
                entity.lazy_supply = add_value(entity.lazy_supply, *lazy_minted, key)?;
                entity.lazy_supply = sub_value(entity.lazy_supply, *lazy_burned, key)?;
            }
        }
        Ok(entity)
    }
}

/// Copies descriptive fields: creators from lazy mints and creator-change
/// events.
struct ItemMetadataReducer;

impl Reducer<Item> for ItemMetadataReducer {
    fn reduce(&self, mut entity: Item, event: &ItemEvent) -> Result<Item, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        match &event.payload {
            ItemPayload::LazyMint { creators, .. } | ItemPayload::Creators { creators, .. } => {
                entity.creators = creators.clone();
            }
            _ => {}
        }
        Ok(entity)
    }
}

/// Undoes one previously applied event. The item family needs a direct
/// reversed reducer because a mint has no natural inverse payload.
struct ReversedItemValueReducer;

impl Reducer<Item> for ReversedItemValueReducer {
    fn reduce(&self, mut entity: Item, event: &ItemEvent) -> Result<Item, ReduceError> {
        let key = event.ordering_key();
        match &event.payload {
            ItemPayload::Mint { supply, lazy, .. } => {
                entity.supply = sub_value(entity.supply, *supply, key)?;
                entity.lazy_supply = add_value(entity.lazy_supply, *lazy, key)?;
            }
            ItemPayload::Burn { supply, .. } => {
                entity.supply = add_value(entity.supply, *supply, key)?;
            }
            ItemPayload::Transfer { .. } => {}
            ItemPayload::LazyMint { supply, .. } => {
                entity.lazy_supply = sub_value(entity.lazy_supply, *supply, key)?;
            }
            ItemPayload::LazyBurn { supply } => {
                entity.lazy_supply = add_value(entity.lazy_supply, *supply, key)?;
            }
            ItemPayload::Creators { previous, .. } => {
                entity.creators = previous.clone();
            }
            ItemPayload::Compacted {
                minted,
                burned,
                lazy_minted,
                lazy_burned,
            } => {
                entity.supply = sub_value(entity.supply, *minted, key)?;
                entity.supply = add_value(entity.supply, *burned, key)?;
                entity.lazy_supply = sub_value(entity.lazy_supply, *lazy_minted, key)?;
                entity.lazy_supply = add_value(entity.lazy_supply, *lazy_burned, key)?;
            }
        }
        Ok(entity)
    }
}

/// Stamps dates and the logical-deletion flag.
struct ItemCalculatedReducer;

impl Reducer<Item> for ItemCalculatedReducer {
    fn reduce(&self, mut entity: Item, event: &ItemEvent) -> Result<Item, ReduceError> {
        if entity.created_at == DateTime::<Utc>::MIN_UTC {
            entity.created_at = event.timestamp();
        }
        entity.last_updated_at = event.timestamp();
        entity.deleted = entity.supply == 0 && entity.lazy_supply == 0;
        Ok(entity)
    }
}

/// Folds finalized supply history into one net summary, so bursts of events
/// in a few blocks cannot grow retained history without bound.
struct ItemCompactionReducer;

impl CompactionReducer<ItemEvent> for ItemCompactionReducer {
    fn merge(&self, event: &ItemEvent, compact: &ItemEvent) -> Result<ItemEvent, ReduceError> {
        let (mut minted, mut burned, mut lazy_minted, mut lazy_burned) = compact.flow();
        let (e_minted, e_burned, e_lazy_minted, e_lazy_burned) = event.flow();
        let key = event.ordering_key();
        let log = match event.status() {
            EventStatus::Confirmed => {
                minted = add_value(minted, e_minted, key)?;
                burned = add_value(burned, e_burned, key)?;
                lazy_minted = add_value(lazy_minted, e_lazy_minted, key)?;
                lazy_burned = add_value(lazy_burned, e_lazy_burned, key)?;
                event.log.clone()
            }
            EventStatus::Reverted => {
                minted = sub_value(minted, e_minted, key)?;
                burned = sub_value(burned, e_burned, key)?;
                lazy_minted = sub_value(lazy_minted, e_lazy_minted, key)?;
                lazy_burned = sub_value(lazy_burned, e_lazy_burned, key)?;
                compact.log.clone()
            }
            other => {
                return Err(ReduceError::UnsupportedPayload(format!(
                    "cannot merge {other} item event into a compacted summary"
                )))
            }
        };
        Ok(ItemEvent {
            log,
            item_id: compact.item_id.clone(),
            payload: ItemPayload::Compacted {
                minted,
                burned,
                lazy_minted,
                lazy_burned,
            },
        })
    }
}

/// Build the item family router over the shared engine.
pub fn item_router(config: &ReduceConfig) -> EventStatusRouter<Item> {
    let forward = ReducerPipeline::new()
        .with(ItemValueReducer)
        .with(ItemMetadataReducer)
        .with(ItemCalculatedReducer);
    let reversed = ReducerPipeline::new()
        .with(ReversedItemValueReducer)
        .with(ItemCalculatedReducer);
    EventStatusRouter::new(
        forward,
        reversed,
        Some(Arc::new(ItemCompactionReducer)),
        config,
    )
}
