//! Reduce service — the per-key sequential driver from an event batch to a
//! persisted entity snapshot plus downstream notifications.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ReduceConfig;
use crate::error::ReduceError;
use crate::event::{Entity, EntityEvent};
use crate::router::EventStatusRouter;
use crate::store::{with_optimistic_retry, EntityStore};

/// Downstream notification seam: called once per affected key after a
/// persisted write that changed observable state.
#[async_trait]
pub trait EntityChangeListener<T: Entity>: Send + Sync {
    async fn on_change(&self, entity: &T) -> Result<(), ReduceError>;
}

/// Drives the reduction of one entity family.
///
/// All events for the same entity key must be processed in ordering-key
/// order and never concurrently with each other; the service folds a same-key
/// batch left-to-right into a single optimistic write. Cross-key parallelism
/// is the caller's business — no lock is held across keys.
pub struct ReduceService<T: Entity> {
    router: EventStatusRouter<T>,
    store: Arc<dyn EntityStore<T>>,
    listeners: Vec<Arc<dyn EntityChangeListener<T>>>,
    config: ReduceConfig,
}

impl<T: Entity> ReduceService<T> {
    pub fn new(
        router: EventStatusRouter<T>,
        store: Arc<dyn EntityStore<T>>,
        config: ReduceConfig,
    ) -> Self {
        Self {
            router,
            store,
            listeners: Vec::new(),
            config,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn EntityChangeListener<T>>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Reduce a batch of events for one entity key.
    ///
    /// The entity is created lazily from its template on the first event for
    /// a new key. The whole batch is folded before the single optimistic
    /// write; on a version conflict the step is retried from a freshly
    /// re-read entity, never merged blindly.
    pub async fn reduce(
        &self,
        id: &<T::Event as EntityEvent>::EntityId,
        events: &[T::Event],
    ) -> Result<T, ReduceError> {
        for event in events {
            if &event.entity_id() != id {
                return Err(ReduceError::Other(format!(
                    "event {} for entity '{}' delivered to stream '{}'",
                    event.ordering_key(),
                    event.entity_id(),
                    id,
                )));
            }
        }
        with_optimistic_retry(self.config.max_save_attempts, || {
            self.reduce_once(id, events)
        })
        .await
    }

    async fn reduce_once(
        &self,
        id: &<T::Event as EntityEvent>::EntityId,
        events: &[T::Event],
    ) -> Result<T, ReduceError> {
        let current = match self.store.get(id).await? {
            Some(entity) => entity,
            None => T::template(id),
        };
        let mut entity = current.clone();
        for event in events {
            entity = self.router.route(entity, event)?;
        }
        if entity == current {
            tracing::debug!(entity = %id, events = events.len(), "Batch produced no state change");
            return Ok(current);
        }
        entity.set_version(entity.version() + 1);
        let saved = self.store.save(entity).await?;
        tracing::debug!(
            entity = %id,
            version = saved.version(),
            events = events.len(),
            "Entity reduced"
        );
        for listener in &self.listeners {
            listener.on_change(&saved).await?;
        }
        Ok(saved)
    }

    /// Reduce a mixed batch: group by entity key, preserving each key's
    /// relative event order, and reduce every group with one write each.
    pub async fn handle_batch(&self, events: &[T::Event]) -> Result<Vec<T>, ReduceError> {
        let mut order: Vec<<T::Event as EntityEvent>::EntityId> = Vec::new();
        let mut groups: HashMap<<T::Event as EntityEvent>::EntityId, Vec<T::Event>> =
            HashMap::new();
        for event in events {
            let id = event.entity_id();
            if !groups.contains_key(&id) {
                order.push(id.clone());
            }
            groups.entry(id).or_default().push(event.clone());
        }
        let mut results = Vec::with_capacity(order.len());
        for id in order {
            results.push(self.reduce(&id, &groups[&id]).await?);
        }
        Ok(results)
    }
}
