//! Apply policies — per-status decision procedures over retained history.
//!
//! For an incoming event against an entity's retained events, each policy
//! answers two questions: "was this already applied?" and "what should the
//! retained history become after applying it?". One variant exists per
//! incoming status: confirm, revert, pending, inactive.

use std::sync::Arc;

use crate::error::ReduceError;
use crate::event::{EntityEvent, RetainedEvent};
use crate::ordering::{EventStatus, OrderingKey};
use crate::reducer::CompactionReducer;

/// Decision procedure for folding one incoming event into retained history.
pub trait EventApplyPolicy<E: EntityEvent>: Send + Sync {
    /// New retained history after applying `incoming`.
    fn reduce(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<Vec<RetainedEvent<E>>, ReduceError>;

    /// Whether `incoming` has already been applied to the entity.
    fn was_applied(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<bool, ReduceError>;
}

// ─── Confirm ──────────────────────────────────────────────────────────────────

/// Policy for incoming CONFIRMED events.
///
/// Appends the event (or promotes its pending twin in place), then forgets
/// the newest retained event that is final relative to the incoming one —
/// final meaning at least `confirmation_depth` blocks below it — together
/// with every confirmed event older than it. None of those can be reverted
/// any more without a reorg deeper than the safety window, which the revert
/// path treats as fatal.
pub struct ConfirmEventApplyPolicy<E: EntityEvent> {
    confirmation_depth: u64,
    compaction: Option<(usize, Arc<dyn CompactionReducer<E>>)>,
}

impl<E: EntityEvent> ConfirmEventApplyPolicy<E> {
    pub fn new(confirmation_depth: u64) -> Self {
        Self {
            confirmation_depth,
            compaction: None,
        }
    }

    /// Cap retained confirmed events at `max_retained`, folding the oldest
    /// ones into a single compacted summary via `compactor`.
    pub fn with_compaction(
        mut self,
        max_retained: usize,
        compactor: Arc<dyn CompactionReducer<E>>,
    ) -> Self {
        self.compaction = Some((max_retained.max(1), compactor));
        self
    }
}

impl<E: EntityEvent> EventApplyPolicy<E> for ConfirmEventApplyPolicy<E> {
    fn reduce(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<Vec<RetainedEvent<E>>, ReduceError> {
        let mut events = insert_or_promote(retained, incoming);

        // Newest retained confirmed event that is final relative to `incoming`.
        let incoming_block = incoming.ordering_key().block_number;
        let mut final_key: Option<OrderingKey> = None;
        for entry in events.iter().rev() {
            if entry.status() != EventStatus::Confirmed {
                continue;
            }
            let block = entry.key().block_number;
            if block > incoming_block {
                // History must never run ahead of the incoming confirmation.
                return Err(ReduceError::OrderingViolation(format!(
                    "incoming confirmed event {} is older than retained event {}",
                    incoming.ordering_key(),
                    entry.key(),
                )));
            }
            if incoming_block - block >= self.confirmation_depth {
                final_key = Some(entry.key());
                break;
            }
        }
        if let Some(final_key) = final_key {
            events.retain(|e| e.status() != EventStatus::Confirmed || e.key() > final_key);
        }

        if let Some((max_retained, compactor)) = &self.compaction {
            compact_oldest(&mut events, *max_retained, compactor.as_ref())?;
        }
        Ok(events)
    }

    fn was_applied(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<bool, ReduceError> {
        let last_confirmed = retained
            .iter()
            .rev()
            .find(|e| e.status() == EventStatus::Confirmed);
        Ok(match last_confirmed {
            Some(entry) => entry.key() >= incoming.ordering_key(),
            None => false,
        })
    }
}

/// Replace a pending twin (same ordering key) with the confirmed event, or
/// insert the event keeping the history sorted by ordering key.
fn insert_or_promote<E: EntityEvent>(
    retained: &[RetainedEvent<E>],
    incoming: &E,
) -> Vec<RetainedEvent<E>> {
    let mut events = retained.to_vec();
    let key = incoming.ordering_key();
    if let Some(pending) = events
        .iter_mut()
        .find(|e| e.status() == EventStatus::Pending && e.key() == key)
    {
        pending.event = incoming.clone();
        return events;
    }
    let at = events.partition_point(|e| e.key() <= key);
    events.insert(at, RetainedEvent::plain(incoming.clone()));
    events
}

/// Fold the oldest confirmed entries into one compacted summary so that at
/// most `max_retained` confirmed entries remain.
fn compact_oldest<E: EntityEvent>(
    events: &mut Vec<RetainedEvent<E>>,
    max_retained: usize,
    compactor: &dyn CompactionReducer<E>,
) -> Result<(), ReduceError> {
    let confirmed: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.status() == EventStatus::Confirmed)
        .map(|(i, _)| i)
        .collect();
    if confirmed.len() <= max_retained {
        return Ok(());
    }
    let fold = &confirmed[..confirmed.len() - max_retained + 1];

    let mut keys: Vec<OrderingKey> = Vec::new();
    let mut iter = fold.iter();
    let Some(&seed) = iter.next() else {
        return Ok(());
    };
    collect_keys(&events[seed], &mut keys);
    let mut summary = events[seed].event.clone();
    let mut last = seed;
    for &i in iter {
        summary = compactor.merge(&events[i].event, &summary)?;
        collect_keys(&events[i], &mut keys);
        last = i;
    }
    events[last] = RetainedEvent {
        event: summary,
        compacted: keys,
    };
    for &i in fold[..fold.len() - 1].iter().rev() {
        events.remove(i);
    }
    Ok(())
}

fn collect_keys<E: EntityEvent>(entry: &RetainedEvent<E>, keys: &mut Vec<OrderingKey>) {
    if entry.compacted.is_empty() {
        keys.push(entry.key());
    } else {
        keys.extend(entry.compacted.iter().copied());
    }
}

// ─── Revert ───────────────────────────────────────────────────────────────────

/// Where a reverted event sits relative to the retained history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RevertTarget {
    /// Exact retained confirmed event at this index.
    Exact(usize),
    /// Compacted entry at this index covering the reverted key.
    Compacted(usize),
    /// No trace — the revert is a benign no-op (never applied here).
    NotApplied,
}

/// Policy for incoming REVERTED events: removes the matching confirmed event,
/// or shrinks the compacted summary covering it.
///
/// A revert with no match whose key already sits `confirmation_depth` or more
/// blocks below the newest retained confirmed event means the target was
/// forgotten as final — that is a fatal consistency error, never a silent
/// no-op, because consumers may have observed the now-invalid state.
pub struct RevertEventApplyPolicy<E: EntityEvent> {
    confirmation_depth: u64,
    compaction: Option<Arc<dyn CompactionReducer<E>>>,
}

impl<E: EntityEvent> RevertEventApplyPolicy<E> {
    pub fn new(confirmation_depth: u64) -> Self {
        Self {
            confirmation_depth,
            compaction: None,
        }
    }

    pub fn with_compaction(mut self, compactor: Arc<dyn CompactionReducer<E>>) -> Self {
        self.compaction = Some(compactor);
        self
    }

    pub(crate) fn locate(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<RevertTarget, ReduceError> {
        let key = incoming.ordering_key();
        // Depth check first: reverting anything at or past the confirmation
        // depth below the newest confirmed event is fatal, matched or not —
        // consumers already treat that history as permanent.
        if let Some(newest) = retained
            .iter()
            .rev()
            .find(|e| e.status() == EventStatus::Confirmed)
        {
            let newest_block = newest.key().block_number;
            if newest_block >= key.block_number {
                let depth = newest_block - key.block_number;
                if depth >= self.confirmation_depth {
                    return Err(ReduceError::RevertedTooDeep { key, depth });
                }
            }
        }
        for (i, entry) in retained.iter().enumerate() {
            if entry.status() != EventStatus::Confirmed {
                continue;
            }
            if entry.is_compacted() {
                if entry.covers(key) {
                    return Ok(RevertTarget::Compacted(i));
                }
            } else if entry.key() == key {
                return Ok(RevertTarget::Exact(i));
            }
        }
        Ok(RevertTarget::NotApplied)
    }
}

impl<E: EntityEvent> EventApplyPolicy<E> for RevertEventApplyPolicy<E> {
    fn reduce(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<Vec<RetainedEvent<E>>, ReduceError> {
        match self.locate(retained, incoming)? {
            RevertTarget::Exact(i) => {
                let mut events = retained.to_vec();
                events.remove(i);
                Ok(events)
            }
            RevertTarget::Compacted(i) => {
                let compactor = self.compaction.as_ref().ok_or_else(|| {
                    ReduceError::UnsupportedPayload(
                        "retained history holds a compacted entry but no compaction reducer is configured"
                            .into(),
                    )
                })?;
                let mut events = retained.to_vec();
                let key = incoming.ordering_key();
                let shrunk = compactor.merge(incoming, &events[i].event)?;
                events[i].event = shrunk;
                events[i].compacted.retain(|k| *k != key);
                if events[i].compacted.is_empty() {
                    events.remove(i);
                }
                Ok(events)
            }
            RevertTarget::NotApplied => Ok(retained.to_vec()),
        }
    }

    fn was_applied(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<bool, ReduceError> {
        Ok(!matches!(
            self.locate(retained, incoming)?,
            RevertTarget::NotApplied
        ))
    }
}

// ─── Pending ──────────────────────────────────────────────────────────────────

/// Policy for incoming PENDING (mempool) events: always appends. An event
/// comparing equal by key — pending or already confirmed — counts as applied,
/// so redelivery and late mempool echoes of mined transactions are no-ops.
pub struct PendingEventApplyPolicy;

impl<E: EntityEvent> EventApplyPolicy<E> for PendingEventApplyPolicy {
    fn reduce(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<Vec<RetainedEvent<E>>, ReduceError> {
        let mut events = retained.to_vec();
        let key = incoming.ordering_key();
        let at = events.partition_point(|e| e.key() <= key);
        events.insert(at, RetainedEvent::plain(incoming.clone()));
        Ok(events)
    }

    fn was_applied(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<bool, ReduceError> {
        let key = incoming.ordering_key();
        Ok(retained.iter().any(|e| e.covers(key)))
    }
}

// ─── Inactive ─────────────────────────────────────────────────────────────────

/// Policy for INACTIVE events (mempool transactions that will never be
/// mined): removes the matching pending event, treating it as if it never
/// happened. `was_applied` is `true` when no matching pending event remains,
/// so the drop happens exactly once under redelivery.
pub struct InactiveEventApplyPolicy;

fn find_pending<E: EntityEvent>(retained: &[RetainedEvent<E>], incoming: &E) -> Option<usize> {
    let key = incoming.ordering_key();
    retained
        .iter()
        .position(|e| e.status() == EventStatus::Pending && e.key() == key)
}

impl<E: EntityEvent> EventApplyPolicy<E> for InactiveEventApplyPolicy {
    fn reduce(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<Vec<RetainedEvent<E>>, ReduceError> {
        let mut events = retained.to_vec();
        if let Some(i) = find_pending(&events, incoming) {
            events.remove(i);
        }
        Ok(events)
    }

    fn was_applied(
        &self,
        retained: &[RetainedEvent<E>],
        incoming: &E,
    ) -> Result<bool, ReduceError> {
        Ok(find_pending(retained, incoming).is_none())
    }
}
