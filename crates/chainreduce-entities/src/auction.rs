//! Auction family: one entity per auction hash, tracking the standing bid
//! and lifecycle flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainreduce_core::{
    Entity, EntityEvent, EventLog, EventStatus, EventStatusRouter, OrderingKey, Reducer,
    ReduceConfig, ReduceError, ReducerPipeline, RetainedEvent,
};

// ─── Events ───────────────────────────────────────────────────────────────────

/// A standing bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub buyer: String,
    pub amount: u128,
}

/// Semantic effect of one interpreted auction-house log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuctionPayload {
    /// Auction put on-chain.
    Created {
        seller: String,
        sell_value: u128,
        minimal_step: u128,
        minimal_price: u128,
        end_time: Option<DateTime<Utc>>,
    },
    /// New highest bid; `previous_bid` is the bid it displaced.
    BidPlaced {
        bid: Bid,
        previous_bid: Option<Bid>,
    },
    /// Seller cancelled the auction.
    Cancelled,
    /// Auction settled.
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionEvent {
    pub log: EventLog,
    /// Auction hash — also the entity key.
    pub hash: String,
    pub payload: AuctionPayload,
}

impl EntityEvent for AuctionEvent {
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
pub enum AuctionState {
    Active,
    Finished,
    Cancelled,
}

/// Materialized auction snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub hash: String,
    pub seller: Option<String>,
    pub sell_value: u128,
    pub minimal_step: u128,
    pub minimal_price: u128,
    pub last_bid: Option<Bid>,
    pub end_time: Option<DateTime<Utc>>,
    pub finished: bool,
    pub cancelled: bool,
    pub state: AuctionState,
    /// Logically deleted: never created, or its creation was reverted.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub version: u64,
    pub retained: Vec<RetainedEvent<AuctionEvent>>,
}

impl Entity for Auction {
    type Event = AuctionEvent;

    fn id(&self) -> String {
        self.hash.clone()
    }

    fn template(id: &String) -> Self {
        Self {
            hash: id.clone(),
            seller: None,
            sell_value: 0,
            minimal_step: 0,
            minimal_price: 0,
            last_bid: None,
            end_time: None,
            finished: false,
            cancelled: false,
            state: AuctionState::Active,
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

    fn retained(&self) -> &[RetainedEvent<AuctionEvent>] {
        &self.retained
    }

    fn set_retained(&mut self, retained: Vec<RetainedEvent<AuctionEvent>>) {
        self.retained = retained;
    }
}

// ─── Reducers ─────────────────────────────────────────────────────────────────

/// Applies confirmed auction effects.
struct AuctionValueReducer;

impl Reducer<Auction> for AuctionValueReducer {
    fn reduce(&self, mut entity: Auction, event: &AuctionEvent) -> Result<Auction, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        match &event.payload {
            AuctionPayload::Created {
                seller,
                sell_value,
                minimal_step,
                minimal_price,
                end_time,
            } => {
                entity.seller = Some(seller.clone());
                entity.sell_value = *sell_value;
                entity.minimal_step = *minimal_step;
                entity.minimal_price = *minimal_price;
                entity.end_time = *end_time;
                entity.finished = false;
                entity.cancelled = false;
                entity.deleted = false;
            }
            AuctionPayload::BidPlaced { bid, .. } => {
                entity.last_bid = Some(bid.clone());
            }
            AuctionPayload::Cancelled => {
                entity.cancelled = true;
            }
            AuctionPayload::Finished => {
                entity.finished = true;
            }
        }
        Ok(entity)
    }
}

/// Undoes one previously applied auction event.
struct ReversedAuctionValueReducer;

impl Reducer<Auction> for ReversedAuctionValueReducer {
    fn reduce(&self, mut entity: Auction, event: &AuctionEvent) -> Result<Auction, ReduceError> {
        match &event.payload {
            AuctionPayload::Created { .. } => {
                let mut blank = Auction::template(&entity.hash);
                blank.version = entity.version;
                blank.created_at = entity.created_at;
                entity = blank;
            }
            AuctionPayload::BidPlaced { previous_bid, .. } => {
                entity.last_bid = previous_bid.clone();
            }
            AuctionPayload::Cancelled => {
                entity.cancelled = false;
            }
            AuctionPayload::Finished => {
                entity.finished = false;
            }
        }
        Ok(entity)
    }
}

/// Derives the lifecycle state and stamps dates.
struct AuctionCalculatedReducer;

impl Reducer<Auction> for AuctionCalculatedReducer {
    fn reduce(&self, mut entity: Auction, event: &AuctionEvent) -> Result<Auction, ReduceError> {
        if entity.created_at == DateTime::<Utc>::MIN_UTC {
            entity.created_at = event.timestamp();
        }
        entity.last_updated_at = event.timestamp();
        entity.state = if entity.cancelled {
            AuctionState::Cancelled
        } else if entity.finished {
            AuctionState::Finished
        } else {
            AuctionState::Active
        };
        Ok(entity)
    }
}

/// Build the auction family router over the shared engine.
pub fn auction_router(config: &ReduceConfig) -> EventStatusRouter<Auction> {
    let forward = ReducerPipeline::new()
        .with(AuctionValueReducer)
        .with(AuctionCalculatedReducer);
    let reversed = ReducerPipeline::new()
        .with(ReversedAuctionValueReducer)
        .with(AuctionCalculatedReducer);
    EventStatusRouter::new(forward, reversed, None, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HASH: &str = "0xauctionhash";

    fn event(status: EventStatus, block: u64, payload: AuctionPayload) -> AuctionEvent {
        AuctionEvent {
            log: EventLog::new(
                status,
                OrderingKey::new(block, 1, 0),
                "0xauctionhouse",
                "0xtx",
                Utc.timestamp_opt(1_700_000_000 + block as i64 * 12, 0).unwrap(),
            ),
            hash: HASH.into(),
            payload,
        }
    }

    fn created(block: u64) -> AuctionEvent {
        event(
            EventStatus::Confirmed,
            block,
            AuctionPayload::Created {
                seller: "0xseller".into(),
                sell_value: 1,
                minimal_step: 10,
                minimal_price: 100,
                end_time: None,
            },
        )
    }

    fn bid(block: u64, buyer: &str, amount: u128, previous: Option<Bid>) -> AuctionEvent {
        event(
            EventStatus::Confirmed,
            block,
            AuctionPayload::BidPlaced {
                bid: Bid {
                    buyer: buyer.into(),
                    amount,
                },
                previous_bid: previous,
            },
        )
    }

    #[test]
    fn creation_and_bids() {
        let router = auction_router(&ReduceConfig::default());
        let auction = Auction::template(&HASH.to_string());
        let auction = router.route(auction, &created(1)).unwrap();
        assert!(!auction.deleted);
        assert_eq!(auction.state, AuctionState::Active);

        let auction = router.route(auction, &bid(2, "0xalice", 100, None)).unwrap();
        let first = auction.last_bid.clone();
        let auction = router
            .route(auction, &bid(3, "0xbob", 120, first))
            .unwrap();
        assert_eq!(auction.last_bid.as_ref().unwrap().buyer, "0xbob");
        assert_eq!(auction.last_bid.as_ref().unwrap().amount, 120);
    }

    #[test]
    fn reverted_bid_restores_previous() {
        let router = auction_router(&ReduceConfig::default());
        let auction = Auction::template(&HASH.to_string());
        let auction = router.route(auction, &created(1)).unwrap();
        let auction = router.route(auction, &bid(2, "0xalice", 100, None)).unwrap();
        let outbid = bid(
            3,
            "0xbob",
            120,
            Some(Bid {
                buyer: "0xalice".into(),
                amount: 100,
            }),
        );
        let auction = router.route(auction, &outbid).unwrap();
        assert_eq!(auction.last_bid.as_ref().unwrap().buyer, "0xbob");

        let mut revert = outbid;
        revert.log.status = EventStatus::Reverted;
        let auction = router.route(auction, &revert).unwrap();
        assert_eq!(auction.last_bid.as_ref().unwrap().buyer, "0xalice");
        assert_eq!(auction.last_bid.as_ref().unwrap().amount, 100);
    }

    #[test]
    fn finish_and_cancel_lifecycle() {
        let router = auction_router(&ReduceConfig::default());
        let auction = Auction::template(&HASH.to_string());
        let auction = router.route(auction, &created(1)).unwrap();
        let auction = router
            .route(auction, &event(EventStatus::Confirmed, 2, AuctionPayload::Finished))
            .unwrap();
        assert_eq!(auction.state, AuctionState::Finished);

        // A reorg takes the settlement back.
        let revert = event(EventStatus::Reverted, 2, AuctionPayload::Finished);
        let auction = router.route(auction, &revert).unwrap();
        assert_eq!(auction.state, AuctionState::Active);
    }

    #[test]
    fn reverted_creation_deletes_auction() {
        let router = auction_router(&ReduceConfig::default());
        let create = created(1);
        let auction = router
            .route(Auction::template(&HASH.to_string()), &create)
            .unwrap();
        assert!(!auction.deleted);

        let mut revert = create;
        revert.log.status = EventStatus::Reverted;
        let auction = router.route(auction, &revert).unwrap();
        assert!(auction.deleted);
        assert!(auction.seller.is_none());
    }
}
