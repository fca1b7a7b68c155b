//! The expression-evaluation seam between the sorting engine and the query
//! executor.
//!
//! Comparators mutate the shared evaluation context (set a current member,
//! evaluate, restore), so every mutation is bracketed by a [`ContextGuard`]
//! scope that restores the context on all exit paths, including error
//! propagation with `?`.

use std::ops::{Deref, DerefMut};

use crate::error::SortResult;
use crate::model::Member;
use crate::value::Scalar;

/// A compiled sort-key expression.
pub trait Expression<M: Member> {
    /// Whether evaluating this expression reads the current member of the
    /// given hierarchy. Drives tuple-key pruning in the memoizer.
    fn depends_on(&self, hierarchy: &M::Hierarchy) -> bool;

    /// True when the expression is the explicit "order by member key"
    /// construct; the facade then compares siblings by order key instead of
    /// by evaluated value.
    fn is_member_order_key(&self) -> bool {
        false
    }
}

/// The mutable evaluation context of the running query.
///
/// One evaluator is borrowed exclusively for the duration of a sort, so
/// implementations need no internal synchronization. The cancellation probe
/// lives here because the evaluator owns the statement execution handle.
pub trait Evaluator {
    type Member: Member;
    type Expr: Expression<Self::Member> + ?Sized;

    /// Opaque marker for the context state at a point in time; `restore`
    /// reverts every context mutation made after the marker was taken.
    /// Savepoints nest in stack order.
    type Savepoint;

    /// Makes `member` the current member of its hierarchy.
    fn set_member_context(&mut self, member: &Self::Member);

    /// Makes each tuple element the current member of its hierarchy.
    fn set_tuple_context(&mut self, tuple: &[Self::Member]);

    fn savepoint(&mut self) -> Self::Savepoint;

    fn restore(&mut self, savepoint: Self::Savepoint);

    /// Evaluates the expression in the current context.
    fn evaluate(&mut self, expr: &Self::Expr) -> SortResult<Scalar<Self::Member>>;

    /// Cancellation/timeout probe, called with a monotone per-sort counter
    /// on every tuple comparison. Implementations typically sample only
    /// every N-th iteration.
    fn check_cancel_or_timeout(&mut self, iteration: u64) -> SortResult<()> {
        let _ = iteration;
        Ok(())
    }
}

/// Scoped savepoint: taken on construction, restored on drop.
pub struct ContextGuard<'a, E: Evaluator> {
    evaluator: &'a mut E,
    savepoint: Option<E::Savepoint>,
}

impl<'a, E: Evaluator> ContextGuard<'a, E> {
    pub fn new(evaluator: &'a mut E) -> Self {
        let savepoint = evaluator.savepoint();
        Self {
            evaluator,
            savepoint: Some(savepoint),
        }
    }
}

impl<E: Evaluator> Deref for ContextGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.evaluator
    }
}

impl<E: Evaluator> DerefMut for ContextGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.evaluator
    }
}

impl<E: Evaluator> Drop for ContextGuard<'_, E> {
    fn drop(&mut self) {
        if let Some(savepoint) = self.savepoint.take() {
            self.evaluator.restore(savepoint);
        }
    }
}
