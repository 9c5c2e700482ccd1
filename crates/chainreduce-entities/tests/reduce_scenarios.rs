//! End-to-end reduction scenarios across the service, store, and router
//! layers, using the balance family.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use chainreduce_core::{
    EventLog, EventStatus, OrderingKey, ReduceConfig, ReduceError, ReduceService,
};
use chainreduce_entities::balance::{
    balance_router, BalanceEvent, BalanceId, BalancePayload, TokenBalance,
};
use chainreduce_storage::MemoryEntityStore;

fn balance_id(owner: &str) -> BalanceId {
    BalanceId::new("0xtoken", owner)
}

fn event(
    owner: &str,
    status: EventStatus,
    block: u64,
    log_index: u32,
    payload: BalancePayload,
) -> BalanceEvent {
    BalanceEvent {
        log: EventLog::new(
            status,
            OrderingKey::new(block, log_index, 0),
            "0xtoken",
            format!("0xtx{block}x{log_index}"),
            Utc.timestamp_opt(1_700_000_000 + block as i64 * 12, 0).unwrap(),
        ),
        balance_id: balance_id(owner),
        payload,
    }
}

fn income(owner: &str, block: u64, value: u128) -> BalanceEvent {
    event(
        owner,
        EventStatus::Confirmed,
        block,
        1,
        BalancePayload::IncomeTransfer {
            value,
            from: "0xsender".into(),
        },
    )
}

fn outcome(owner: &str, block: u64, value: u128) -> BalanceEvent {
    event(
        owner,
        EventStatus::Confirmed,
        block,
        1,
        BalancePayload::OutcomeTransfer {
            value,
            to: "0xreceiver".into(),
        },
    )
}

fn reverted(event: &BalanceEvent) -> BalanceEvent {
    let mut copy = event.clone();
    copy.log.status = EventStatus::Reverted;
    copy
}

fn service() -> ReduceService<TokenBalance> {
    let config = ReduceConfig::default();
    ReduceService::new(
        balance_router(&config),
        Arc::new(MemoryEntityStore::new()),
        config,
    )
}

#[tokio::test]
async fn reduces_income_and_outcome_chain() {
    let svc = service();
    let id = balance_id("0xowner");
    let saved = svc
        .reduce(&id, &[income("0xowner", 1, 9), outcome("0xowner", 2, 7)])
        .await
        .unwrap();
    assert_eq!(saved.balance, 2);
    assert_eq!(saved.version, 1);
}

#[tokio::test]
async fn redelivered_batch_is_idempotent() {
    let svc = service();
    let id = balance_id("0xowner");
    let batch = [income("0xowner", 1, 9), outcome("0xowner", 2, 7)];

    let first = svc.reduce(&id, &batch).await.unwrap();
    let second = svc.reduce(&id, &batch).await.unwrap();
    assert_eq!(first, second, "replaying a committed batch changes nothing");
    assert_eq!(second.version, 1);
}

#[tokio::test]
async fn apply_then_revert_restores_prior_state() {
    let svc = service();
    let id = balance_id("0xowner");
    let incoming = income("0xowner", 5, 10);

    let before = svc.reduce(&id, &[income("0xowner", 1, 7)]).await.unwrap();
    let applied = svc.reduce(&id, &[incoming.clone()]).await.unwrap();
    assert_eq!(applied.balance, 17);

    let after = svc.reduce(&id, &[reverted(&incoming)]).await.unwrap();
    assert_eq!(after.balance, before.balance);
    assert_eq!(after.retained, before.retained);
}

#[tokio::test]
async fn interleaved_keys_reduce_independently() {
    let svc = service();
    let alice = balance_id("0xalice");
    let bob = balance_id("0xbob");

    // One mixed batch, arbitrary interleaving across keys.
    let batch = vec![
        income("0xalice", 1, 10),
        income("0xbob", 1, 100),
        outcome("0xalice", 2, 4),
        outcome("0xbob", 3, 50),
        income("0xalice", 4, 1),
    ];
    svc.handle_batch(&batch).await.unwrap();

    // The same events per key, processed in isolation, agree.
    let isolated = service();
    isolated
        .reduce(
            &alice,
            &[
                income("0xalice", 1, 10),
                outcome("0xalice", 2, 4),
                income("0xalice", 4, 1),
            ],
        )
        .await
        .unwrap();
    isolated
        .reduce(&bob, &[income("0xbob", 1, 100), outcome("0xbob", 3, 50)])
        .await
        .unwrap();

    let svc_store_alice = svc.reduce(&alice, &[]).await.unwrap();
    let isolated_alice = isolated.reduce(&alice, &[]).await.unwrap();
    assert_eq!(svc_store_alice.balance, isolated_alice.balance);
    assert_eq!(svc_store_alice.balance, 7);

    let svc_store_bob = svc.reduce(&bob, &[]).await.unwrap();
    assert_eq!(svc_store_bob.balance, 50);
}

#[tokio::test]
async fn finalized_history_is_forgotten_and_revert_rejected() {
    let svc = service();
    let id = balance_id("0xowner");
    let old = income("0xowner", 10, 5);
    let newer = income("0xowner", 22, 1); // 10 + confirmation depth

    let saved = svc.reduce(&id, &[old.clone(), newer]).await.unwrap();
    assert_eq!(saved.balance, 6);
    assert_eq!(
        saved.retained.len(),
        1,
        "the block-10 event passed finality and was forgotten"
    );

    // Reverting the forgotten event is a reorg deeper than the safety window.
    let err = svc.reduce(&id, &[reverted(&old)]).await.unwrap_err();
    assert!(matches!(err, ReduceError::RevertedTooDeep { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn pending_confirm_promotion_applies_value_once() {
    let svc = service();
    let id = balance_id("0xowner");
    let pending = event(
        "0xowner",
        EventStatus::Pending,
        3,
        1,
        BalancePayload::IncomeTransfer {
            value: 9,
            from: "0xsender".into(),
        },
    );
    let confirmed = {
        let mut copy = pending.clone();
        copy.log.status = EventStatus::Confirmed;
        copy
    };

    let after_pending = svc.reduce(&id, &[pending]).await.unwrap();
    assert_eq!(after_pending.balance, 0);
    assert_eq!(after_pending.retained.len(), 1);

    let after_confirm = svc.reduce(&id, &[confirmed]).await.unwrap();
    assert_eq!(after_confirm.balance, 9);
    assert_eq!(after_confirm.retained.len(), 1);
}

#[tokio::test]
async fn entity_is_created_lazily() {
    let svc = service();
    let id = balance_id("0xfresh");

    // No events, no entity.
    let untouched = svc.reduce(&id, &[]).await.unwrap();
    assert_eq!(untouched.version, 0, "empty batch does not persist anything");

    let saved = svc.reduce(&id, &[income("0xfresh", 1, 1)]).await.unwrap();
    assert_eq!(saved.version, 1);
    assert!(!saved.deleted);
}

#[tokio::test]
async fn draining_balance_marks_entity_deleted() {
    let svc = service();
    let id = balance_id("0xowner");
    let saved = svc
        .reduce(&id, &[income("0xowner", 1, 5), outcome("0xowner", 2, 5)])
        .await
        .unwrap();
    assert_eq!(saved.balance, 0);
    assert!(saved.deleted);
}
