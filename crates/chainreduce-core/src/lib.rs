//! chainreduce-core — generic, reorg-safe entity reduction engine.
//!
//! Reconstructs materialized entities (balances, items, ownerships, orders,
//! auctions) from streams of interpreted blockchain logs that arrive out of
//! order relative to finality: pending from the mempool, later confirmed,
//! and — after a chain reorganization — reverted. The engine tolerates
//! redelivery, undoes reverted history in O(1) without replays, and forgets
//! events only once they are final past the configured confirmation depth.
//!
//! # Architecture
//!
//! ```text
//! event batch → ReduceService (per-key sequential, optimistic save + retry)
//!                  └── EventStatusRouter
//!                         ├── EntityChainReducer + ConfirmEventApplyPolicy
//!                         ├── EntityChainReducer + PendingEventApplyPolicy
//!                         ├── EntityChainReducer + InactiveEventApplyPolicy
//!                         └── RevertedEntityChainReducer + RevertEventApplyPolicy
//!                                └── reversed ReducerPipeline (+ CompactionReducer)
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod ordering;
pub mod policy;
pub mod reducer;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use chain::{EntityChainReducer, RevertedEntityChainReducer};
pub use config::ReduceConfig;
pub use error::ReduceError;
pub use event::{Entity, EntityEvent, EventLog, RetainedEvent};
pub use ordering::{EventStatus, OrderingKey};
pub use policy::{
    ConfirmEventApplyPolicy, EventApplyPolicy, InactiveEventApplyPolicy, PendingEventApplyPolicy,
    RevertEventApplyPolicy,
};
pub use reducer::{add_value, sub_value, CompactionReducer, InvertingReducer, Reducer, ReducerPipeline};
pub use router::EventStatusRouter;
pub use service::{EntityChangeListener, ReduceService};
pub use store::{with_optimistic_retry, EntityStore};
