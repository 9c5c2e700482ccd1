//! Event status router — dispatches an incoming event to the correct
//! orchestrator so the four apply-policy variants never leak into call sites.

use std::sync::Arc;

use crate::chain::{EntityChainReducer, RevertedEntityChainReducer};
use crate::config::ReduceConfig;
use crate::error::ReduceError;
use crate::event::{Entity, EntityEvent};
use crate::ordering::EventStatus;
use crate::policy::{
    ConfirmEventApplyPolicy, InactiveEventApplyPolicy, PendingEventApplyPolicy,
    RevertEventApplyPolicy,
};
use crate::reducer::{CompactionReducer, ReducerPipeline};

/// Four-state dispatch over `event.status()`. This is the single
/// parameterization point for an entity family:
/// `{forward pipeline, reversed pipeline, optional compaction, config}`.
pub struct EventStatusRouter<T: Entity> {
    confirmed: EntityChainReducer<T>,
    pending: EntityChainReducer<T>,
    inactive: EntityChainReducer<T>,
    reverted: RevertedEntityChainReducer<T>,
}

impl<T: Entity> EventStatusRouter<T> {
    pub fn new(
        forward: ReducerPipeline<T>,
        reversed: ReducerPipeline<T>,
        compaction: Option<Arc<dyn CompactionReducer<T::Event>>>,
        config: &ReduceConfig,
    ) -> Self {
        let forward = Arc::new(forward);
        let reversed = Arc::new(reversed);

        let mut confirm_policy = ConfirmEventApplyPolicy::new(config.confirmation_depth);
        let mut revert_policy = RevertEventApplyPolicy::new(config.confirmation_depth);
        if let Some(compactor) = compaction {
            confirm_policy =
                confirm_policy.with_compaction(config.max_retained_events, compactor.clone());
            revert_policy = revert_policy.with_compaction(compactor);
        }

        Self {
            confirmed: EntityChainReducer::new(Box::new(confirm_policy), forward.clone()),
            pending: EntityChainReducer::new(Box::new(PendingEventApplyPolicy), forward.clone()),
            inactive: EntityChainReducer::new(Box::new(InactiveEventApplyPolicy), forward),
            reverted: RevertedEntityChainReducer::new(revert_policy, reversed),
        }
    }

    /// Produce the next entity snapshot from one incoming event.
    pub fn route(&self, entity: T, event: &T::Event) -> Result<T, ReduceError> {
        match event.status() {
            EventStatus::Confirmed => self.confirmed.reduce(entity, event),
            EventStatus::Pending => self.pending.reduce(entity, event),
            EventStatus::Reverted => self.reverted.reduce(entity, event),
            EventStatus::Inactive => self.inactive.reduce(entity, event),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{add, counter_entity, counter_router, pending_add, reverted};
    use crate::ReduceConfig;

    #[test]
    fn routes_by_status() {
        let router = counter_router(&ReduceConfig::default());
        let entity = counter_entity(0);

        let entity = router.route(entity, &add(1, 1, 9)).unwrap();
        assert_eq!(entity.total, 9);

        // Pending events are recorded but do not move the confirmed value.
        let entity = router.route(entity, &pending_add(2, 1, 5)).unwrap();
        assert_eq!(entity.total, 9);
        assert_eq!(entity.retained.len(), 2);

        let entity = router.route(entity, &reverted(1, 1, 9)).unwrap();
        assert_eq!(entity.total, 0);
        assert_eq!(entity.retained.len(), 1);
    }

    #[test]
    fn pending_then_confirmed_applies_value_once() {
        let router = counter_router(&ReduceConfig::default());
        let entity = counter_entity(0);

        let entity = router.route(entity, &pending_add(3, 1, 10)).unwrap();
        assert_eq!(entity.total, 0);
        assert_eq!(entity.retained.len(), 1);

        let entity = router.route(entity, &add(3, 1, 10)).unwrap();
        assert_eq!(entity.total, 10);
        assert_eq!(entity.retained.len(), 1, "pending twin promoted in place");
    }

    #[test]
    fn inactive_drops_pending_record() {
        let router = counter_router(&ReduceConfig::default());
        let entity = counter_entity(0);

        let pending = pending_add(3, 1, 10);
        let entity = router.route(entity, &pending).unwrap();
        assert_eq!(entity.retained.len(), 1);

        let mut inactive = pending.clone();
        inactive.log.status = crate::EventStatus::Inactive;
        let entity = router.route(entity, &inactive).unwrap();
        assert!(entity.retained.is_empty());
        assert_eq!(entity.total, 0);

        // Redelivered drop is a no-op.
        let entity = router.route(entity, &inactive).unwrap();
        assert!(entity.retained.is_empty());
    }
}
