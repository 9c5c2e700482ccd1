//! Reducers — pure fold steps composed into per-family pipelines.

use crate::error::ReduceError;
use crate::event::{Entity, EntityEvent};
use crate::ordering::OrderingKey;

/// A pure fold step: `(entity, event) -> entity'`. No I/O, and total over
/// every payload variant the reducer is declared to support — an
/// unrecognized variant is a hard [`ReduceError::UnsupportedPayload`], never
/// a silent skip.
pub trait Reducer<T: Entity>: Send + Sync {
    fn reduce(&self, entity: T, event: &T::Event) -> Result<T, ReduceError>;
}

/// Ordered composition of single-purpose reducers. Reduction is a straight
/// left fold over the registered reducers.
pub struct ReducerPipeline<T: Entity> {
    reducers: Vec<Box<dyn Reducer<T>>>,
}

impl<T: Entity> ReducerPipeline<T> {
    pub fn new() -> Self {
        Self {
            reducers: Vec::new(),
        }
    }

    pub fn with(mut self, reducer: impl Reducer<T> + 'static) -> Self {
        self.reducers.push(Box::new(reducer));
        self
    }

    pub fn reduce(&self, entity: T, event: &T::Event) -> Result<T, ReduceError> {
        self.reducers
            .iter()
            .try_fold(entity, |acc, r| r.reduce(acc, event))
    }
}

impl<T: Entity> Default for ReducerPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reversed counterpart of a forward value reducer: flip the direction of the
/// event's effect and re-run the forward logic, so undo never duplicates it.
pub struct InvertingReducer<T: Entity> {
    forward: Box<dyn Reducer<T>>,
    invert: fn(&T::Event) -> T::Event,
}

impl<T: Entity> InvertingReducer<T> {
    pub fn new(forward: Box<dyn Reducer<T>>, invert: fn(&T::Event) -> T::Event) -> Self {
        Self { forward, invert }
    }
}

impl<T: Entity> Reducer<T> for InvertingReducer<T> {
    fn reduce(&self, entity: T, event: &T::Event) -> Result<T, ReduceError> {
        self.forward.reduce(entity, &(self.invert)(event))
    }
}

/// Merges events into a running compacted summary.
///
/// Confirmed events fold their contribution in; reverted events withdraw it.
/// The merged summary carries the newer of the two ordering keys, so the
/// retained history stays sorted.
pub trait CompactionReducer<E: EntityEvent>: Send + Sync {
    fn merge(&self, event: &E, compact: &E) -> Result<E, ReduceError>;
}

// ─── Checked value arithmetic ─────────────────────────────────────────────────

/// Add `amount` to `current`, failing loudly on overflow.
pub fn add_value(current: u128, amount: u128, key: OrderingKey) -> Result<u128, ReduceError> {
    current
        .checked_add(amount)
        .ok_or(ReduceError::ValueOverflow { key })
}

/// Subtract `amount` from `current`. Underflow means the history being folded
/// is inconsistent and must stop the key, not wrap around.
pub fn sub_value(current: u128, amount: u128, key: OrderingKey) -> Result<u128, ReduceError> {
    current
        .checked_sub(amount)
        .ok_or(ReduceError::ValueUnderflow {
            key,
            current,
            amount,
        })
}
