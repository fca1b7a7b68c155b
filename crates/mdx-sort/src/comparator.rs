//! Expression-driven member and tuple comparators.
//!
//! A comparator borrows the evaluator exclusively and carries one sort key
//! per `(expression, direction)` spec; multi-key comparison is lexicographic
//! with earlier keys dominant. Every evaluation performed while comparing is
//! bracketed by a [`ContextGuard`], so the shared context is never left
//! pointing at an arbitrary member, on any exit path.
//!
//! The `descending` flag of a key applies to the value (or order-key)
//! comparison only. The sibling fallback of the hierarchical kind (ordinal,
//! then natural order) is never reversed; a reversed fallback would
//! interleave members of different parents.

use std::cmp::Ordering;

use crate::error::SortResult;
use crate::eval::{ContextGuard, Evaluator, Expression};
use crate::hierarchy;
use crate::memo::{MemberMemo, TupleMemo};
use crate::model::{Member, OrderKey, SortKeySpec, SortOrder};
use crate::value::{self, Scalar};

/// Comparison strategy of one sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareKind {
    /// Compare evaluated values over the flat list, ignoring hierarchy.
    Break,
    /// Keep members grouped under their ancestors; sibling ties resolve by
    /// evaluated value, then by sibling order.
    Hierarchical,
    /// Keep members grouped under their ancestors; siblings resolve by
    /// explicit order key.
    HierarchicalKey,
}

impl CompareKind {
    pub(crate) fn from_flags(breaks_hierarchy: bool, order_by_key: bool) -> Self {
        if breaks_hierarchy {
            CompareKind::Break
        } else if order_by_key {
            CompareKind::HierarchicalKey
        } else {
            CompareKind::Hierarchical
        }
    }
}

fn apply_direction(ord: Ordering, descending: bool) -> Ordering {
    if descending {
        ord.reverse()
    } else {
        ord
    }
}

fn fmt_cached<M: Member>(value: Option<&Scalar<M>>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "?".to_owned(),
    }
}

struct MemberSortKey<'a, E: Evaluator> {
    expr: &'a E::Expr,
    kind: CompareKind,
    descending: bool,
    memo: MemberMemo<E::Member>,
}

impl<'a, E: Evaluator> MemberSortKey<'a, E> {
    fn new(spec: SortKeySpec<'a, E::Expr>) -> Self {
        Self {
            expr: spec.expr,
            kind: CompareKind::from_flags(
                spec.order.breaks_hierarchy(),
                spec.expr.is_member_order_key(),
            ),
            descending: spec.order.is_descending(),
            memo: MemberMemo::new(),
        }
    }

    fn compare(
        &mut self,
        evaluator: &mut E,
        a: &E::Member,
        b: &E::Member,
    ) -> SortResult<Ordering> {
        match self.kind {
            CompareKind::Break => self.compare_by_value(evaluator, a, b),
            CompareKind::Hierarchical => {
                let memo = &mut self.memo;
                let expr = self.expr;
                let descending = self.descending;
                hierarchy::compare_with_sibling_rule(a, b, false, |x, y| {
                    let vx = memo.get_or_eval(evaluator, expr, x)?;
                    let vy = memo.get_or_eval(evaluator, expr, y)?;
                    let ord = apply_direction(value::compare_values(&vx, &vy)?, descending);
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                    hierarchy::compare_sibling_members(x, y)
                })
            }
            CompareKind::HierarchicalKey => {
                let descending = self.descending;
                hierarchy::compare_with_sibling_rule(a, b, false, |x, y| {
                    Ok(apply_direction(
                        hierarchy::compare_order_keys(
                            &OrderKey(x.clone()),
                            &OrderKey(y.clone()),
                        )?,
                        descending,
                    ))
                })
            }
        }
    }

    fn compare_by_value(
        &mut self,
        evaluator: &mut E,
        a: &E::Member,
        b: &E::Member,
    ) -> SortResult<Ordering> {
        let va = self.memo.get_or_eval(evaluator, self.expr, a)?;
        let vb = self.memo.get_or_eval(evaluator, self.expr, b)?;
        Ok(apply_direction(
            value::compare_values(&va, &vb)?,
            self.descending,
        ))
    }
}

/// Compares members according to one or more sort-key specs.
pub struct MemberComparator<'a, E: Evaluator> {
    evaluator: &'a mut E,
    keys: Vec<MemberSortKey<'a, E>>,
}

impl<'a, E: Evaluator> MemberComparator<'a, E> {
    pub fn new(evaluator: &'a mut E, expr: &'a E::Expr, order: SortOrder) -> Self {
        Self::with_keys(evaluator, &[SortKeySpec::new(expr, order)])
    }

    pub fn with_keys(evaluator: &'a mut E, specs: &[SortKeySpec<'a, E::Expr>]) -> Self {
        Self {
            evaluator,
            keys: specs.iter().map(|spec| MemberSortKey::new(*spec)).collect(),
        }
    }

    /// Bulk-loads pre-evaluated values into the memo of one key, so the
    /// comparator's lazy path is not exercised during the sort.
    pub(crate) fn preload_values(
        &mut self,
        key: usize,
        values: impl IntoIterator<Item = (E::Member, Scalar<E::Member>)>,
    ) {
        if let Some(key) = self.keys.get_mut(key) {
            key.memo.preload(values);
        }
    }

    pub fn compare(&mut self, a: &E::Member, b: &E::Member) -> SortResult<Ordering> {
        let mut result = Ordering::Equal;
        for key in self.keys.iter_mut() {
            result = key.compare(self.evaluator, a, b)?;
            if result != Ordering::Equal {
                break;
            }
        }
        if log::log_enabled!(log::Level::Debug) {
            if let Some(key) = self.keys.first() {
                log::debug!(
                    "compare {:?} ({}) and {:?} ({}) yields {:?}",
                    a,
                    fmt_cached(key.memo.peek(a)),
                    b,
                    fmt_cached(key.memo.peek(b)),
                    result
                );
            }
        }
        Ok(result)
    }
}

struct TupleSortKey<'a, E: Evaluator> {
    expr: &'a E::Expr,
    kind: CompareKind,
    descending: bool,
    memo: TupleMemo<E::Member>,
}

impl<'a, E: Evaluator> TupleSortKey<'a, E> {
    fn new(spec: SortKeySpec<'a, E::Expr>) -> Self {
        Self {
            expr: spec.expr,
            kind: CompareKind::from_flags(
                spec.order.breaks_hierarchy(),
                spec.expr.is_member_order_key(),
            ),
            descending: spec.order.is_descending(),
            memo: TupleMemo::new(),
        }
    }

    fn compare(
        &mut self,
        evaluator: &mut E,
        a: &[E::Member],
        b: &[E::Member],
    ) -> SortResult<Ordering> {
        match self.kind {
            CompareKind::Break => self.compare_by_value(evaluator, a, b),
            CompareKind::Hierarchical => self.compare_positions_by_value(evaluator, a, b),
            CompareKind::HierarchicalKey => self.compare_positions_by_key(a, b),
        }
    }

    /// Whole-tuple value comparison with dependency pruning: equal projected
    /// keys decide without evaluating anything.
    fn compare_by_value(
        &mut self,
        evaluator: &mut E,
        a: &[E::Member],
        b: &[E::Member],
    ) -> SortResult<Ordering> {
        let key_a = self.memo.key_for(self.expr, a);
        let key_b = self.memo.key_for(self.expr, b);
        if key_a == key_b {
            return Ok(Ordering::Equal);
        }
        let va = self.memo.get_or_eval(evaluator, self.expr, key_a, a)?;
        let vb = self.memo.get_or_eval(evaluator, self.expr, key_b, b)?;
        Ok(apply_direction(
            value::compare_values(&va, &vb)?,
            self.descending,
        ))
    }

    /// Position-by-position hierarchical comparison. Values at a sibling
    /// step are context-dependent (they see the earlier, already-equal tuple
    /// positions), so each equal position is pushed into the context before
    /// moving right, and nothing here is memoized.
    fn compare_positions_by_value(
        &mut self,
        evaluator: &mut E,
        a: &[E::Member],
        b: &[E::Member],
    ) -> SortResult<Ordering> {
        let expr = self.expr;
        let descending = self.descending;
        let mut guard = ContextGuard::new(evaluator);
        for (ma, mb) in a.iter().zip(b.iter()) {
            let ord = hierarchy::compare_with_sibling_rule(ma, mb, false, |x, y| {
                let (vx, vy) = evaluate_sibling_pair(&mut *guard, expr, x, y)?;
                let ord = apply_direction(value::compare_values(&vx, &vy)?, descending);
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
                hierarchy::compare_sibling_members(x, y)
            })?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
            guard.set_member_context(ma);
        }
        Ok(Ordering::Equal)
    }

    fn compare_positions_by_key(
        &self,
        a: &[E::Member],
        b: &[E::Member],
    ) -> SortResult<Ordering> {
        let descending = self.descending;
        for (ma, mb) in a.iter().zip(b.iter()) {
            let ord = hierarchy::compare_with_sibling_rule(ma, mb, false, |x, y| {
                Ok(apply_direction(
                    hierarchy::compare_order_keys(&OrderKey(x.clone()), &OrderKey(y.clone()))?,
                    descending,
                ))
            })?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }
}

fn evaluate_sibling_pair<E: Evaluator>(
    evaluator: &mut E,
    expr: &E::Expr,
    x: &E::Member,
    y: &E::Member,
) -> SortResult<(Scalar<E::Member>, Scalar<E::Member>)> {
    let mut guard = ContextGuard::new(evaluator);
    guard.set_member_context(x);
    let vx = guard.evaluate(expr)?;
    guard.set_member_context(y);
    let vy = guard.evaluate(expr)?;
    Ok((vx, vy))
}

/// Compares tuples according to one or more sort-key specs.
///
/// Every comparison increments a monotone counter and probes the evaluator's
/// cancellation check; a long-running sort over a large cross join is
/// abandoned mid-flight rather than run to completion.
pub struct TupleComparator<'a, E: Evaluator> {
    evaluator: &'a mut E,
    keys: Vec<TupleSortKey<'a, E>>,
    iterations: u64,
}

impl<'a, E: Evaluator> TupleComparator<'a, E> {
    pub fn new(evaluator: &'a mut E, expr: &'a E::Expr, order: SortOrder) -> Self {
        Self::with_keys(evaluator, &[SortKeySpec::new(expr, order)])
    }

    pub fn with_keys(evaluator: &'a mut E, specs: &[SortKeySpec<'a, E::Expr>]) -> Self {
        Self {
            evaluator,
            keys: specs.iter().map(|spec| TupleSortKey::new(*spec)).collect(),
            iterations: 0,
        }
    }

    pub fn compare(&mut self, a: &[E::Member], b: &[E::Member]) -> SortResult<Ordering> {
        self.iterations += 1;
        self.evaluator.check_cancel_or_timeout(self.iterations)?;
        let mut result = Ordering::Equal;
        for key in self.keys.iter_mut() {
            result = key.compare(self.evaluator, a, b)?;
            if result != Ordering::Equal {
                break;
            }
        }
        Ok(result)
    }

    pub(crate) fn log_cache_stats(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for (index, key) in self.keys.iter().enumerate() {
            if key.kind == CompareKind::Break {
                let stats = key.memo.stats();
                log::debug!(
                    "tuple sort key {index}: eval cache {} hits, {} misses, {} evictions",
                    stats.hits,
                    stats.misses,
                    stats.evictions
                );
            }
        }
    }
}
