//! Marketplace order family: one entity per order hash, tracking fill and
//! cancellation. Matching semantics and pricing live outside the reduction
//! engine; only the on-chain effects are folded here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainreduce_core::{
    add_value, sub_value, Entity, EntityEvent, EventLog, EventStatus, EventStatusRouter,
    OrderingKey, Reducer, ReduceConfig, ReduceError, ReducerPipeline, RetainedEvent,
};

// ─── Events ───────────────────────────────────────────────────────────────────

/// Semantic effect of one interpreted exchange log on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OrderPayload {
    /// Order placed on-chain.
    OnChainOrder {
        maker: String,
        make_value: u128,
        take_value: u128,
    },
    /// A match filled `value` of the take side.
    Filled { value: u128 },
    /// Maker cancelled the order.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub log: EventLog,
    /// Order hash — also the entity key.
    pub hash: String,
    pub payload: OrderPayload,
}

impl EntityEvent for OrderEvent {
    type EntityId = String;

    fn entity_id(&self) -> String {
        self.hash.clone()
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

/// Lifecycle state derived from the folded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Active,
    Filled,
    Cancelled,
}

/// Materialized order snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub hash: String,
    pub maker: Option<String>,
    pub make_value: u128,
    pub take_value: u128,
    /// Total filled so far, in take-side units.
    pub fill: u128,
    pub cancelled: bool,
    pub state: OrderState,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub version: u64,
    pub retained: Vec<RetainedEvent<OrderEvent>>,
}

impl Entity for Order {
    type Event = OrderEvent;

    fn id(&self) -> String {
        self.hash.clone()
    }

    fn template(id: &String) -> Self {
        Self {
            hash: id.clone(),
            maker: None,
            make_value: 0,
            take_value: 0,
            fill: 0,
            cancelled: false,
            state: OrderState::Active,
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

    fn retained(&self) -> &[RetainedEvent<OrderEvent>] {
        &self.retained
    }

    fn set_retained(&mut self, retained: Vec<RetainedEvent<OrderEvent>>) {
        self.retained = retained;
    }
}

// ─── Reducers ─────────────────────────────────────────────────────────────────

/// Applies confirmed order effects.
struct OrderValueReducer;

impl Reducer<Order> for OrderValueReducer {
    fn reduce(&self, mut entity: Order, event: &OrderEvent) -> Result<Order, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        let key = event.ordering_key();
        match &event.payload {
            OrderPayload::OnChainOrder {
                maker,
                make_value,
                take_value,
            } => {
                entity.maker = Some(maker.clone());
                entity.make_value = *make_value;
                entity.take_value = *take_value;
            }
            OrderPayload::Filled { value } => {
                entity.fill = add_value(entity.fill, *value, key)?;
            }
            OrderPayload::Cancelled => {
                entity.cancelled = true;
            }
        }
        Ok(entity)
    }
}

/// Undoes one previously applied order event.
struct ReversedOrderValueReducer;

impl Reducer<Order> for ReversedOrderValueReducer {
    fn reduce(&self, mut entity: Order, event: &OrderEvent) -> Result<Order, ReduceError> {
        let key = event.ordering_key();
        match &event.payload {
            OrderPayload::OnChainOrder { .. } => {
                entity.maker = None;
                entity.make_value = 0;
                entity.take_value = 0;
            }
            OrderPayload::Filled { value } => {
                entity.fill = sub_value(entity.fill, *value, key)?;
            }
            OrderPayload::Cancelled => {
                entity.cancelled = false;
            }
        }
        Ok(entity)
    }
}

/// Derives the lifecycle state and stamps dates.
struct OrderCalculatedReducer;

impl Reducer<Order> for OrderCalculatedReducer {
    fn reduce(&self, mut entity: Order, event: &OrderEvent) -> Result<Order, ReduceError> {
        if entity.created_at == DateTime::<Utc>::MIN_UTC {
            entity.created_at = event.timestamp();
        }
        entity.last_updated_at = event.timestamp();
        entity.state = if entity.cancelled {
            OrderState::Cancelled
        } else if entity.take_value > 0 && entity.fill >= entity.take_value {
            OrderState::Filled
        } else {
            OrderState::Active
        };
        Ok(entity)
    }
}

/// Build the order family router over the shared engine.
pub fn order_router(config: &ReduceConfig) -> EventStatusRouter<Order> {
    let forward = ReducerPipeline::new()
        .with(OrderValueReducer)
        .with(OrderCalculatedReducer);
    let reversed = ReducerPipeline::new()
        .with(ReversedOrderValueReducer)
        .with(OrderCalculatedReducer);
    EventStatusRouter::new(forward, reversed, None, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HASH: &str = "0xorderhash";

    fn event(status: EventStatus, block: u64, payload: OrderPayload) -> OrderEvent {
        OrderEvent {
            log: EventLog::new(
                status,
                OrderingKey::new(block, 1, 0),
                "0xexchange",
                "0xtx",
                Utc.timestamp_opt(1_700_000_000 + block as i64 * 12, 0).unwrap(),
            ),
            hash: HASH.into(),
            payload,
        }
    }

    fn placed(block: u64) -> OrderEvent {
        event(
            EventStatus::Confirmed,
            block,
            OrderPayload::OnChainOrder {
                maker: "0xmaker".into(),
                make_value: 1,
                take_value: 100,
            },
        )
    }

    #[test]
    fn fills_accumulate_until_filled() {
        let router = order_router(&ReduceConfig::default());
        let order = Order::template(&HASH.to_string());
        let order = router.route(order, &placed(1)).unwrap();
        assert_eq!(order.state, OrderState::Active);

        let order = router
            .route(order, &event(EventStatus::Confirmed, 2, OrderPayload::Filled { value: 40 }))
            .unwrap();
        assert_eq!(order.fill, 40);
        assert_eq!(order.state, OrderState::Active);

        let order = router
            .route(order, &event(EventStatus::Confirmed, 3, OrderPayload::Filled { value: 60 }))
            .unwrap();
        assert_eq!(order.fill, 100);
        assert_eq!(order.state, OrderState::Filled);
    }

    #[test]
    fn cancel_wins_over_fill_state() {
        let router = order_router(&ReduceConfig::default());
        let order = Order::template(&HASH.to_string());
        let order = router.route(order, &placed(1)).unwrap();
        let order = router
            .route(order, &event(EventStatus::Confirmed, 2, OrderPayload::Cancelled))
            .unwrap();
        assert_eq!(order.state, OrderState::Cancelled);
    }

    #[test]
    fn reverted_fill_reopens_order() {
        let router = order_router(&ReduceConfig::default());
        let fill = event(EventStatus::Confirmed, 2, OrderPayload::Filled { value: 100 });
        let order = Order::template(&HASH.to_string());
        let order = router.route(order, &placed(1)).unwrap();
        let order = router.route(order, &fill).unwrap();
        assert_eq!(order.state, OrderState::Filled);

        let mut revert = fill;
        revert.log.status = EventStatus::Reverted;
        let order = router.route(order, &revert).unwrap();
        assert_eq!(order.fill, 0);
        assert_eq!(order.state, OrderState::Active);
    }

    #[test]
    fn reverted_cancel_reactivates_order() {
        let router = order_router(&ReduceConfig::default());
        let cancel = event(EventStatus::Confirmed, 2, OrderPayload::Cancelled);
        let order = Order::template(&HASH.to_string());
        let order = router.route(order, &placed(1)).unwrap();
        let order = router.route(order, &cancel).unwrap();
        assert_eq!(order.state, OrderState::Cancelled);

        let mut revert = cancel;
        revert.log.status = EventStatus::Reverted;
        let order = router.route(order, &revert).unwrap();
        assert_eq!(order.state, OrderState::Active);
    }
}
