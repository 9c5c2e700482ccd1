//! Fungible-token balance family: one entity per (token, owner) pair,
//! reduced from transfer, wrap, and approval logs.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainreduce_core::{
    add_value, sub_value, CompactionReducer, Entity, EntityEvent, EventLog, EventStatus,
    EventStatusRouter, InvertingReducer, OrderingKey, Reducer, ReduceConfig, ReduceError,
    ReducerPipeline, RetainedEvent,
};

// ─── Identity ─────────────────────────────────────────────────────────────────

/// Identifier of one token balance: (token contract, owner address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceId {
    pub token: String,
    pub owner: String,
}

impl BalanceId {
    pub fn new(token: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            owner: owner.into(),
        }
    }
}

impl fmt::Display for BalanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.token, self.owner)
    }
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// Semantic effect of one interpreted ERC-20-style log on a balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BalancePayload {
    /// Tokens received from `from`.
    IncomeTransfer { value: u128, from: String },
    /// Tokens sent to `to`.
    OutcomeTransfer { value: u128, to: String },
    /// Wrapped-token deposit credited to the owner.
    Deposit { value: u128 },
    /// Wrapped-token withdrawal debited from the owner.
    Withdrawal { value: u128 },
    /// Spender allowance set to `value`. `previous` is the allowance this
    /// approval replaced, stamped by the log interpreter so the effect can be
    /// undone without replaying history.
    TokenApproval {
        spender: String,
        value: u128,
        previous: u128,
    },
    /// Net effect of compacted transfer history. Produced only by
    /// compaction, never by log interpreters.
    Compacted { income: u128, outcome: u128 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEvent {
    pub log: EventLog,
    pub balance_id: BalanceId,
    pub payload: BalancePayload,
}

impl EntityEvent for BalanceEvent {
    type EntityId = BalanceId;

    fn entity_id(&self) -> BalanceId {
        self.balance_id.clone()
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

impl BalanceEvent {
    /// Flip the direction of the effect; reversed reduction re-runs the
    /// forward logic on the flipped event.
    fn invert(&self) -> Self {
        let payload = match self.payload.clone() {
            BalancePayload::IncomeTransfer { value, from } => {
                BalancePayload::OutcomeTransfer { value, to: from }
            }
            BalancePayload::OutcomeTransfer { value, to } => {
                BalancePayload::IncomeTransfer { value, from: to }
            }
            BalancePayload::Deposit { value } => BalancePayload::Withdrawal { value },
            BalancePayload::Withdrawal { value } => BalancePayload::Deposit { value },
            BalancePayload::TokenApproval {
                spender,
                value,
                previous,
            } => BalancePayload::TokenApproval {
                spender,
                value: previous,
                previous: value,
            },
            BalancePayload::Compacted { income, outcome } => BalancePayload::Compacted {
                income: outcome,
                outcome: income,
            },
        };
        Self {
            payload,
            ..self.clone()
        }
    }

    /// (income, outcome) contribution to a compacted summary. Approvals
    /// contribute nothing: their undo information travels on the event itself.
    fn flow(&self) -> (u128, u128) {
        match &self.payload {
            BalancePayload::IncomeTransfer { value, .. } | BalancePayload::Deposit { value } => {
                (*value, 0)
            }
            BalancePayload::OutcomeTransfer { value, .. }
            | BalancePayload::Withdrawal { value } => (0, *value),
            BalancePayload::TokenApproval { .. } => (0, 0),
            BalancePayload::Compacted { income, outcome } => (*income, *outcome),
        }
    }
}

// ─── Entity ───────────────────────────────────────────────────────────────────

/// Materialized balance snapshot for one (token, owner) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub id: BalanceId,
    pub balance: u128,
    /// Last approved spender allowance.
    pub allowance: u128,
    /// Logically deleted: the balance returned to zero.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub version: u64,
    pub retained: Vec<RetainedEvent<BalanceEvent>>,
}

impl Entity for TokenBalance {
    type Event = BalanceEvent;

    fn id(&self) -> BalanceId {
        self.id.clone()
    }

    fn template(id: &BalanceId) -> Self {
        Self {
            id: id.clone(),
            balance: 0,
            allowance: 0,
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

    fn retained(&self) -> &[RetainedEvent<BalanceEvent>] {
        &self.retained
    }

    fn set_retained(&mut self, retained: Vec<RetainedEvent<BalanceEvent>>) {
        self.retained = retained;
    }
}

// ─── Reducers ─────────────────────────────────────────────────────────────────

/// Applies the confirmed value effect of one event to the balance fields.
/// Pending and inactive events are recorded in history only — a mempool
/// transaction cannot move a confirmed balance.
struct BalanceValueReducer;

impl Reducer<TokenBalance> for BalanceValueReducer {
    fn reduce(
        &self,
        mut entity: TokenBalance,
        event: &BalanceEvent,
    ) -> Result<TokenBalance, ReduceError> {
        if matches!(event.status(), EventStatus::Pending | EventStatus::Inactive) {
            return Ok(entity);
        }
        let key = event.ordering_key();
        match &event.payload {
            BalancePayload::IncomeTransfer { value, .. } | BalancePayload::Deposit { value } => {
                entity.balance = add_value(entity.balance, *value, key)?;
            }
            BalancePayload::OutcomeTransfer { value, .. }
            | BalancePayload::Withdrawal { value } => {
                entity.balance = sub_value(entity.balance, *value, key)?;
            }
            BalancePayload::TokenApproval { value, .. } => {
                entity.allowance = *value;
            }
            BalancePayload::Compacted { income, outcome } => {
                entity.balance = add_value(entity.balance, *income, key)?;
                entity.balance = sub_value(entity.balance, *outcome, key)?;
            }
        }
        Ok(entity)
    }
}

/// Stamps bookkeeping fields derived from the rest of the snapshot.
struct BalanceCalculatedReducer;

impl Reducer<TokenBalance> for BalanceCalculatedReducer {
    fn reduce(
        &self,
        mut entity: TokenBalance,
        event: &BalanceEvent,
    ) -> Result<TokenBalance, ReduceError> {
        if entity.created_at == DateTime::<Utc>::MIN_UTC {
            entity.created_at = event.timestamp();
        }
        entity.last_updated_at = event.timestamp();
        entity.deleted = entity.balance == 0 && entity.allowance == 0;
        Ok(entity)
    }
}

/// Folds finalized transfer history into a net income/outcome summary.
struct BalanceCompactionReducer;

impl CompactionReducer<BalanceEvent> for BalanceCompactionReducer {
    fn merge(
        &self,
        event: &BalanceEvent,
        compact: &BalanceEvent,
    ) -> Result<BalanceEvent, ReduceError> {
        let (mut income, mut outcome) = compact.flow();
        let (event_income, event_outcome) = event.flow();
        let key = event.ordering_key();
        let log = match event.status() {
            EventStatus::Confirmed => {
                income = add_value(income, event_income, key)?;
                outcome = add_value(outcome, event_outcome, key)?;
                event.log.clone()
            }
            EventStatus::Reverted => {
                income = sub_value(income, event_income, key)?;
                outcome = sub_value(outcome, event_outcome, key)?;
                compact.log.clone()
            }
            other => {
                return Err(ReduceError::UnsupportedPayload(format!(
                    "cannot merge {other} balance event into a compacted summary"
                )))
            }
        };
        Ok(BalanceEvent {
            log,
            balance_id: compact.balance_id.clone(),
            payload: BalancePayload::Compacted { income, outcome },
        })
    }
}

/// Build the balance family router over the shared engine.
pub fn balance_router(config: &ReduceConfig) -> EventStatusRouter<TokenBalance> {
    let forward = ReducerPipeline::new()
        .with(BalanceValueReducer)
        .with(BalanceCalculatedReducer);
    let reversed = ReducerPipeline::new()
        .with(InvertingReducer::new(
            Box::new(BalanceValueReducer),
            |event: &BalanceEvent| event.invert(),
        ))
        .with(BalanceCalculatedReducer);
    EventStatusRouter::new(
        forward,
        reversed,
        Some(Arc::new(BalanceCompactionReducer)),
        config,
    )
}
