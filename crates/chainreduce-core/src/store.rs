//! Entity store seam and the optimistic-retry combinator.

use std::future::Future;

use async_trait::async_trait;

use crate::error::ReduceError;
use crate::event::{Entity, EntityEvent};

/// Optimistic-concurrency-controlled persistence of entity snapshots.
///
/// `save` must compare-and-set on the version token: the write succeeds only
/// when the entity's version is exactly one above the stored version (or 1
/// for a key with no stored entity), and fails with
/// [`ReduceError::VersionConflict`] otherwise. Implementations live in
/// `chainreduce-storage`.
#[async_trait]
pub trait EntityStore<T: Entity>: Send + Sync {
    async fn get(
        &self,
        id: &<T::Event as EntityEvent>::EntityId,
    ) -> Result<Option<T>, ReduceError>;

    async fn save(&self, entity: T) -> Result<T, ReduceError>;
}

/// Run `op` until it succeeds, retrying only on optimistic version conflicts
/// and at most `max_attempts` times in total. Conflicts are expected to be
/// rare and transient (one logical owner per key), so there is no backoff —
/// the operation re-reads and retries immediately.
pub async fn with_optimistic_retry<T, F, Fut>(
    max_attempts: u32,
    mut op: F,
) -> Result<T, ReduceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReduceError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                tracing::debug!(attempt, error = %err, "Optimistic write conflict, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> ReduceError {
        ReduceError::VersionConflict {
            entity_id: "k".into(),
            expected: 2,
            found: 1,
        }
    }

    #[tokio::test]
    async fn retries_conflicts_up_to_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_optimistic_retry(3, || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(conflict())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_conflict() {
        let calls = AtomicU32::new(0);
        let result = with_optimistic_retry(3, || async {
            if calls.fetch_add(1, Ordering::Relaxed) == 0 {
                Err(conflict())
            } else {
                Ok(42u32)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn non_conflict_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_optimistic_retry(5, || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(ReduceError::Storage("connection reset".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
