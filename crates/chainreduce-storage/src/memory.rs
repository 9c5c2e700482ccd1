//! In-memory entity store.
//!
//! Keeps entity snapshots in RAM with the same compare-and-set contract as
//! the persistent backends. Useful for tests and short-lived indexers.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use chainreduce_core::{Entity, EntityEvent, EntityStore, ReduceError};

/// In-memory entity store. All data is lost when the process exits.
pub struct MemoryEntityStore<T> {
    data: Mutex<HashMap<String, T>>,
}

impl<T> MemoryEntityStore<T> {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    /// Returns `true` if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }
}

impl<T> Default for MemoryEntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> EntityStore<T> for MemoryEntityStore<T> {
    async fn get(
        &self,
        id: &<T::Event as EntityEvent>::EntityId,
    ) -> Result<Option<T>, ReduceError> {
        Ok(self.data.lock().unwrap().get(&id.to_string()).cloned())
    }

    async fn save(&self, entity: T) -> Result<T, ReduceError> {
        let key = entity.id().to_string();
        let mut data = self.data.lock().unwrap();
        let expected = data.get(&key).map(|e| e.version() + 1).unwrap_or(1);
        if entity.version() != expected {
            return Err(ReduceError::VersionConflict {
                entity_id: key,
                expected,
                found: entity.version(),
            });
        }
        data.insert(key, entity.clone());
        Ok(entity)
    }
}
