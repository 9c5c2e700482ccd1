//! Chain reducers — the forward and revert orchestrators that combine an
//! apply policy with a reducer pipeline to produce the next entity snapshot.

use std::sync::Arc;

use crate::error::ReduceError;
use crate::event::{Entity, EntityEvent};
use crate::policy::{EventApplyPolicy, RevertEventApplyPolicy, RevertTarget};
use crate::reducer::ReducerPipeline;

/// Forward-path orchestrator for confirmed, pending, and inactive events.
pub struct EntityChainReducer<T: Entity> {
    policy: Box<dyn EventApplyPolicy<T::Event>>,
    pipeline: Arc<ReducerPipeline<T>>,
}

impl<T: Entity> EntityChainReducer<T> {
    pub fn new(
        policy: Box<dyn EventApplyPolicy<T::Event>>,
        pipeline: Arc<ReducerPipeline<T>>,
    ) -> Self {
        Self { policy, pipeline }
    }

    /// Apply one incoming event. Deterministic for a given (entity, event)
    /// pair; an already-applied event returns the entity unchanged, which is
    /// what makes at-least-once delivery safe to replay.
    pub fn reduce(&self, entity: T, event: &T::Event) -> Result<T, ReduceError> {
        if self.policy.was_applied(entity.retained(), event)? {
            tracing::debug!(
                entity = %entity.id(),
                key = %event.ordering_key(),
                "Event already applied, skipping"
            );
            return Ok(entity);
        }
        let retained = self.policy.reduce(entity.retained(), event)?;
        let mut next = self.pipeline.reduce(entity, event)?;
        next.set_retained(retained);
        Ok(next)
    }
}

/// Revert-path orchestrator: undoes the effect of a previously applied event
/// using the reversed pipeline, in O(1) over the length of history — no
/// replay.
///
/// When the reverted event was folded into a compacted summary, its own
/// payload (the incoming event) drives the undo and the summary is shrunk by
/// the family's compaction reducer.
pub struct RevertedEntityChainReducer<T: Entity> {
    policy: RevertEventApplyPolicy<T::Event>,
    reversed: Arc<ReducerPipeline<T>>,
}

impl<T: Entity> RevertedEntityChainReducer<T> {
    pub fn new(policy: RevertEventApplyPolicy<T::Event>, reversed: Arc<ReducerPipeline<T>>) -> Self {
        Self { policy, reversed }
    }

    pub fn reduce(&self, entity: T, event: &T::Event) -> Result<T, ReduceError> {
        let undo_event = match self.policy.locate(entity.retained(), event)? {
            RevertTarget::Exact(i) => entity.retained()[i].event.clone(),
            RevertTarget::Compacted(_) => event.clone(),
            RevertTarget::NotApplied => {
                tracing::debug!(
                    entity = %entity.id(),
                    key = %event.ordering_key(),
                    "Nothing to revert, skipping"
                );
                return Ok(entity);
            }
        };
        let retained = self.policy.reduce(entity.retained(), event)?;
        let mut next = self.reversed.reduce(entity, &undo_event)?;
        next.set_retained(retained);
        Ok(next)
    }
}
