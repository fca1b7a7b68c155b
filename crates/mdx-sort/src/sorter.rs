//! The facade the query executor calls: Order, TopCount/BottomCount, and
//! Hierarchize over member lists and tuple lists.
//!
//! Member-list operations evaluate the sort-key expression once per distinct
//! member (plus ancestors, when the comparison is hierarchical) before the
//! sort begins, and hand the resulting map to the comparator, so the hot
//! comparison loop never calls the evaluator. Evaluation and sorting are
//! timed as separate phases. Tuple operations cannot pre-evaluate a cross
//! join; they lean on the comparator's pruned, bounded memo instead.

use std::time::Instant;

use ahash::AHashMap;

use crate::comparator::{CompareKind, MemberComparator, TupleComparator};
use crate::error::SortResult;
use crate::eval::{Evaluator, Expression};
use crate::hierarchy;
use crate::memo::evaluate_members_for_sort;
use crate::model::{Member, SortKeySpec, SortOrder, Tuple};
use crate::partial::stable_partial_sort;
use crate::quicksort::stable_sort_by;
use crate::value::Scalar;

/// Sorts members in place by one expression and direction.
pub fn sort_members<E: Evaluator>(
    evaluator: &mut E,
    members: &mut [E::Member],
    expr: &E::Expr,
    order: SortOrder,
) -> SortResult<()> {
    sort_members_by_keys(evaluator, members, &[SortKeySpec::new(expr, order)])
}

/// Sorts members in place by several (expression, direction) keys, earlier
/// keys dominant. The sort is stable, so rows tied on every key keep their
/// input order.
pub fn sort_members_by_keys<E: Evaluator>(
    evaluator: &mut E,
    members: &mut [E::Member],
    specs: &[SortKeySpec<'_, E::Expr>],
) -> SortResult<()> {
    if members.len() < 2 || specs.is_empty() {
        return Ok(());
    }
    let preloads = evaluate_sort_keys(evaluator, members, specs)?;

    let start = Instant::now();
    let mut comparator = MemberComparator::with_keys(evaluator, specs);
    for (index, values) in preloads.into_iter().enumerate() {
        if let Some(values) = values {
            comparator.preload_values(index, values);
        }
    }
    stable_sort_by(members, |a, b| comparator.compare(a, b))?;
    log::debug!(
        "sorted {} members by {} keys in {:?}",
        members.len(),
        specs.len(),
        start.elapsed()
    );
    Ok(())
}

/// Sorts tuples in place by one expression and direction.
pub fn sort_tuples<E: Evaluator>(
    evaluator: &mut E,
    tuples: &mut [Tuple<E::Member>],
    expr: &E::Expr,
    order: SortOrder,
) -> SortResult<()> {
    sort_tuples_by_keys(evaluator, tuples, &[SortKeySpec::new(expr, order)])
}

/// Sorts tuples in place by several (expression, direction) keys.
pub fn sort_tuples_by_keys<E: Evaluator>(
    evaluator: &mut E,
    tuples: &mut [Tuple<E::Member>],
    specs: &[SortKeySpec<'_, E::Expr>],
) -> SortResult<()> {
    if tuples.len() < 2 || specs.is_empty() {
        return Ok(());
    }
    let start = Instant::now();
    let mut comparator = TupleComparator::with_keys(evaluator, specs);
    stable_sort_by(tuples, |a, b| comparator.compare(a, b))?;
    comparator.log_cache_stats();
    log::debug!(
        "sorted {} tuples by {} keys in {:?}",
        tuples.len(),
        specs.len(),
        start.elapsed()
    );
    Ok(())
}

/// Returns the `limit` best members by evaluated value: the largest first
/// when `descending` (TopCount), the smallest first otherwise (BottomCount).
/// Equal-valued members keep their input order, exactly as a full stable
/// sort truncated to `limit` would have them.
pub fn partially_sort_members<E: Evaluator>(
    evaluator: &mut E,
    members: &[E::Member],
    expr: &E::Expr,
    limit: usize,
    descending: bool,
) -> SortResult<Vec<E::Member>> {
    if members.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    if members.len() == 1 {
        return Ok(members.to_vec());
    }
    let order = if descending {
        SortOrder::BreakDesc
    } else {
        SortOrder::BreakAsc
    };
    let values = evaluate_members_for_sort(evaluator, expr, members, false)?;

    let start = Instant::now();
    let mut comparator = MemberComparator::new(evaluator, expr, order);
    comparator.preload_values(0, values);
    let result = stable_partial_sort(members, |a, b| comparator.compare(a, b), limit)?;
    log::debug!(
        "partially sorted {} of {} members in {:?}",
        result.len(),
        members.len(),
        start.elapsed()
    );
    Ok(result)
}

/// Returns the `limit` best tuples by evaluated value; see
/// [`partially_sort_members`].
pub fn partially_sort_tuples<E: Evaluator>(
    evaluator: &mut E,
    tuples: &[Tuple<E::Member>],
    expr: &E::Expr,
    limit: usize,
    descending: bool,
) -> SortResult<Vec<Tuple<E::Member>>> {
    if tuples.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    if tuples.len() == 1 {
        return Ok(tuples.to_vec());
    }
    let order = if descending {
        SortOrder::BreakDesc
    } else {
        SortOrder::BreakAsc
    };
    let start = Instant::now();
    let mut comparator = TupleComparator::new(evaluator, expr, order);
    let result = stable_partial_sort(tuples, |a, b| comparator.compare(a, b), limit)?;
    comparator.log_cache_stats();
    log::debug!(
        "partially sorted {} of {} tuples in {:?}",
        result.len(),
        tuples.len(),
        start.elapsed()
    );
    Ok(result)
}

/// Arranges members into the order a pre-order (or, with `post`, post-order)
/// traversal of their hierarchy would visit them. Stable, and therefore a
/// no-op on an already hierarchized list.
pub fn hierarchize_members<M: Member>(members: &mut [M], post: bool) -> SortResult<()> {
    if members.len() < 2 {
        return Ok(());
    }
    if members.first().is_some_and(Member::is_high_cardinality) {
        log::warn!("cannot hierarchize a high-cardinality hierarchy; leaving the list as is");
        return Ok(());
    }
    let start = Instant::now();
    stable_sort_by(members, |a, b| hierarchy::compare_hierarchically(a, b, post))?;
    log::debug!(
        "hierarchized {} members in {:?}",
        members.len(),
        start.elapsed()
    );
    Ok(())
}

/// Arranges tuples into hierarchical traversal order, position by position:
/// earlier positions dominate, so the result nests like a report axis.
pub fn hierarchize_tuples<M: Member>(tuples: &mut [Tuple<M>], post: bool) -> SortResult<()> {
    if tuples.len() < 2 {
        return Ok(());
    }
    if tuples
        .first()
        .is_some_and(|tuple| tuple.iter().any(Member::is_high_cardinality))
    {
        log::warn!("cannot hierarchize tuples over a high-cardinality hierarchy; leaving the list as is");
        return Ok(());
    }
    let start = Instant::now();
    stable_sort_by(tuples, |a, b| {
        hierarchy::compare_tuples_hierarchically(a, b, post)
    })?;
    log::debug!(
        "hierarchized {} tuples in {:?}",
        tuples.len(),
        start.elapsed()
    );
    Ok(())
}

/// Evaluation phase of a member sort: one value map per sort key that needs
/// evaluated values (order-by-key specs need none). Hierarchical keys also
/// cover every ancestor, since their sibling resolution compares ancestor
/// values on the way down.
fn evaluate_sort_keys<E: Evaluator>(
    evaluator: &mut E,
    members: &[E::Member],
    specs: &[SortKeySpec<'_, E::Expr>],
) -> SortResult<Vec<Option<AHashMap<E::Member, Scalar<E::Member>>>>> {
    let mut preloads = Vec::with_capacity(specs.len());
    for spec in specs {
        let kind = CompareKind::from_flags(
            spec.order.breaks_hierarchy(),
            spec.expr.is_member_order_key(),
        );
        let values = match kind {
            CompareKind::HierarchicalKey => None,
            CompareKind::Break => {
                Some(evaluate_members_for_sort(evaluator, spec.expr, members, false)?)
            }
            CompareKind::Hierarchical => {
                Some(evaluate_members_for_sort(evaluator, spec.expr, members, true)?)
            }
        };
        preloads.push(values);
    }
    Ok(preloads)
}
