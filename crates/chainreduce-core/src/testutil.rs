//! Test fixtures: a minimal counter entity reduced from add/sub events.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::config::ReduceConfig;
use crate::error::ReduceError;
use crate::event::{Entity, EntityEvent, EventLog, RetainedEvent};
use crate::ordering::{EventStatus, OrderingKey};
use crate::reducer::{
    add_value, sub_value, CompactionReducer, InvertingReducer, Reducer, ReducerPipeline,
};
use crate::router::EventStatusRouter;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CounterPayload {
    Add(u128),
    Sub(u128),
    Compacted { added: u128, subtracted: u128 },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CounterEvent {
    pub log: EventLog,
    pub id: String,
    pub payload: CounterPayload,
}

impl EntityEvent for CounterEvent {
    type EntityId = String;

    fn entity_id(&self) -> String {
        self.id.clone()
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

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CounterEntity {
    pub id: String,
    pub total: u128,
    pub version: u64,
    pub retained: Vec<RetainedEvent<CounterEvent>>,
}

impl Entity for CounterEntity {
    type Event = CounterEvent;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn template(id: &String) -> Self {
        Self {
            id: id.clone(),
            total: 0,
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

    fn retained(&self) -> &[RetainedEvent<CounterEvent>] {
        &self.retained
    }

    fn set_retained(&mut self, retained: Vec<RetainedEvent<CounterEvent>>) {
        self.retained = retained;
    }
}

pub(crate) struct CounterReducer;

impl Reducer<CounterEntity> for CounterReducer {
    fn reduce(
        &self,
        mut entity: CounterEntity,
        event: &CounterEvent,
    ) -> Result<CounterEntity, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        let key = event.ordering_key();
        match &event.payload {
            CounterPayload::Add(value) => entity.total = add_value(entity.total, *value, key)?,
            CounterPayload::Sub(value) => entity.total = sub_value(entity.total, *value, key)?,
            CounterPayload::Compacted { added, subtracted } => {
                entity.total = add_value(entity.total, *added, key)?;
                entity.total = sub_value(entity.total, *subtracted, key)?;
            }
        }
        Ok(entity)
    }
}

pub(crate) fn invert_counter(event: &CounterEvent) -> CounterEvent {
    let payload = match &event.payload {
        CounterPayload::Add(value) => CounterPayload::Sub(*value),
        CounterPayload::Sub(value) => CounterPayload::Add(*value),
        CounterPayload::Compacted { added, subtracted } => CounterPayload::Compacted {
            added: *subtracted,
            subtracted: *added,
        },
    };
    CounterEvent {
        payload,
        ..event.clone()
    }
}

pub(crate) struct CounterCompaction;

impl CompactionReducer<CounterEvent> for CounterCompaction {
    fn merge(&self, event: &CounterEvent, compact: &CounterEvent) -> Result<CounterEvent, ReduceError> {
        let (mut added, mut subtracted) = match &compact.payload {
            CounterPayload::Add(value) => (*value, 0),
            CounterPayload::Sub(value) => (0, *value),
            CounterPayload::Compacted { added, subtracted } => (*added, *subtracted),
        };
        let (event_added, event_subtracted) = match &event.payload {
            CounterPayload::Add(value) => (*value, 0),
            CounterPayload::Sub(value) => (0, *value),
            CounterPayload::Compacted { added, subtracted } => (*added, *subtracted),
        };
        let key = event.ordering_key();
        let log = match event.status() {
            EventStatus::Confirmed => {
                added = add_value(added, event_added, key)?;
                subtracted = add_value(subtracted, event_subtracted, key)?;
                event.log.clone()
            }
            EventStatus::Reverted => {
                added = sub_value(added, event_added, key)?;
                subtracted = sub_value(subtracted, event_subtracted, key)?;
                compact.log.clone()
            }
            other => {
                return Err(ReduceError::UnsupportedPayload(format!(
                    "cannot merge {other} event into a compacted summary"
                )))
            }
        };
        Ok(CounterEvent {
            log,
            id: compact.id.clone(),
            payload: CounterPayload::Compacted { added, subtracted },
        })
    }
}

pub(crate) fn counter_router(config: &ReduceConfig) -> EventStatusRouter<CounterEntity> {
    let forward = ReducerPipeline::new().with(CounterReducer);
    let reversed =
        ReducerPipeline::new().with(InvertingReducer::new(Box::new(CounterReducer), invert_counter));
    EventStatusRouter::new(forward, reversed, Some(Arc::new(CounterCompaction)), config)
}

pub(crate) fn ts() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub(crate) fn event(
    status: EventStatus,
    block: u64,
    log_index: u32,
    payload: CounterPayload,
) -> CounterEvent {
    CounterEvent {
        log: EventLog::new(
            status,
            OrderingKey::new(block, log_index, 0),
            "0xc0ffee",
            "0xtx",
            ts(),
        ),
        id: "counter".into(),
        payload,
    }
}

/// Confirmed `Add` event.
pub(crate) fn add(block: u64, log_index: u32, value: u128) -> CounterEvent {
    event(EventStatus::Confirmed, block, log_index, CounterPayload::Add(value))
}

/// Pending `Add` event.
pub(crate) fn pending_add(block: u64, log_index: u32, value: u128) -> CounterEvent {
    event(EventStatus::Pending, block, log_index, CounterPayload::Add(value))
}

/// Reverted twin of a previously confirmed `Add` event.
pub(crate) fn reverted(block: u64, log_index: u32, value: u128) -> CounterEvent {
    event(EventStatus::Reverted, block, log_index, CounterPayload::Add(value))
}

pub(crate) fn counter_entity(total: u128) -> CounterEntity {
    CounterEntity {
        id: "counter".into(),
        total,
        version: 0,
        retained: Vec::new(),
    }
}
