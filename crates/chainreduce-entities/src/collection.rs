//! Collection family: one entity per token contract, carrying descriptive
//! metadata and the contract owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainreduce_core::{
    Entity, EntityEvent, EventLog, EventStatus, EventStatusRouter, OrderingKey, Reducer,
    ReduceConfig, ReduceError, ReducerPipeline, RetainedEvent,
};

// ─── Events ───────────────────────────────────────────────────────────────────

/// Capabilities a collection contract advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionFeature {
    ApproveForAll,
    SetUriPrefix,
    BurnableToken,
    MintWithAddress,
    SecondarySaleFees,
}

/// Semantic effect of one interpreted log on a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CollectionPayload {
    /// Contract deployed: descriptive fields are copied from this event only.
    Created {
        name: String,
        symbol: String,
        owner: String,
        features: Vec<CollectionFeature>,
    },
    /// Contract ownership handed over; `previous` is the owner it replaced.
    OwnershipTransferred {
        owner: String,
        previous: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEvent {
    pub log: EventLog,
    /// Collection address — also the entity key.
    pub collection: String,
    pub payload: CollectionPayload,
}

impl EntityEvent for CollectionEvent {
    type EntityId = String;

    fn entity_id(&self) -> String {
        self.collection.clone()
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

// ─── Entity ───────────────────────────────────────────────────────────────────

/// Materialized collection snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub owner: Option<String>,
    pub features: Vec<CollectionFeature>,
    /// Logically deleted: never created, or its creation was reverted.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub version: u64,
    pub retained: Vec<RetainedEvent<CollectionEvent>>,
}

impl Entity for Collection {
    type Event = CollectionEvent;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn template(id: &String) -> Self {
        Self {
            id: id.clone(),
            name: String::new(),
            symbol: String::new(),
            owner: None,
            features: Vec::new(),
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

    fn retained(&self) -> &[RetainedEvent<CollectionEvent>] {
        &self.retained
    }

    fn set_retained(&mut self, retained: Vec<RetainedEvent<CollectionEvent>>) {
        self.retained = retained;
    }
}

// ─── Reducers ─────────────────────────────────────────────────────────────────

/// Copies descriptive fields from creation and ownership-transfer logs.
struct CollectionMetadataReducer;

impl Reducer<Collection> for CollectionMetadataReducer {
    fn reduce(
        &self,
        mut entity: Collection,
        event: &CollectionEvent,
    ) -> Result<Collection, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        match &event.payload {
            CollectionPayload::Created {
                name,
                symbol,
                owner,
                features,
            } => {
                entity.name = name.clone();
                entity.symbol = symbol.clone();
                entity.owner = Some(owner.clone());
                entity.features = features.clone();
                entity.deleted = false;
            }
            CollectionPayload::OwnershipTransferred { owner, .. } => {
                entity.owner = Some(owner.clone());
            }
        }
        Ok(entity)
    }
}

/// Undoes a previously applied collection event: reverting the creation
/// returns the entity to its zero template.
struct ReversedCollectionMetadataReducer;

impl Reducer<Collection> for ReversedCollectionMetadataReducer {
    fn reduce(
        &self,
        mut entity: Collection,
        event: &CollectionEvent,
    ) -> Result<Collection, ReduceError> {
        match &event.payload {
            CollectionPayload::Created { .. } => {
                let mut blank = Collection::template(&entity.id);
                blank.version = entity.version;
                blank.retained = std::mem::take(&mut entity.retained);
                blank.created_at = entity.created_at;
                entity = blank;
            }
            CollectionPayload::OwnershipTransferred { previous, .. } => {
                entity.owner = previous.clone();
            }
        }
        Ok(entity)
    }
}

/// Stamps bookkeeping dates.
struct CollectionCalculatedReducer;

impl Reducer<Collection> for CollectionCalculatedReducer {
    fn reduce(
        &self,
        mut entity: Collection,
        event: &CollectionEvent,
    ) -> Result<Collection, ReduceError> {
        if entity.created_at == DateTime::<Utc>::MIN_UTC {
            entity.created_at = event.timestamp();
        }
        entity.last_updated_at = event.timestamp();
        Ok(entity)
    }
}

/// Build the collection family router over the shared engine.
pub fn collection_router(config: &ReduceConfig) -> EventStatusRouter<Collection> {
    let forward = ReducerPipeline::new()
        .with(CollectionMetadataReducer)
        .with(CollectionCalculatedReducer);
    let reversed = ReducerPipeline::new()
        .with(ReversedCollectionMetadataReducer)
        .with(CollectionCalculatedReducer);
    EventStatusRouter::new(forward, reversed, None, config)
}
