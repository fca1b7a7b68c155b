//! Memoized sort-key evaluation.
//!
//! Sorting evaluates the same expression for the same member or tuple many
//! times (a comparison sort performs O(n log n) comparisons over n distinct
//! entities), so comparators route every evaluation through a memo. For
//! members the memo is an unbounded map, usually preloaded in one pass by
//! the facade. For tuples the memo key is the tuple projected onto the
//! positions the expression actually depends on, and the map is bounded: a
//! cross join can be enormous, and evicting an entry merely costs a repeat
//! evaluation.

use std::time::Instant;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::cache::{CacheStats, LruCache};
use crate::error::SortResult;
use crate::eval::{ContextGuard, Evaluator, Expression};
use crate::model::Member;
use crate::value::Scalar;

/// Upper bound on memoized tuple evaluations per sort key.
pub(crate) const TUPLE_EVAL_CACHE_ENTRIES: usize = 100_000;

/// Evaluates `expr` with `member` as context, restoring the context after.
pub(crate) fn evaluate_member<E: Evaluator>(
    evaluator: &mut E,
    expr: &E::Expr,
    member: &E::Member,
) -> SortResult<Scalar<E::Member>> {
    let mut guard = ContextGuard::new(evaluator);
    guard.set_member_context(member);
    guard.evaluate(expr)
}

/// Evaluates `expr` once for every distinct member of `members`, and for
/// every ancestor when `with_parents` is set (hierarchical comparison also
/// orders ancestors by value). Runs inside a single savepoint scope.
pub(crate) fn evaluate_members_for_sort<E: Evaluator>(
    evaluator: &mut E,
    expr: &E::Expr,
    members: &[E::Member],
    with_parents: bool,
) -> SortResult<AHashMap<E::Member, Scalar<E::Member>>> {
    let start = Instant::now();
    let mut values = AHashMap::with_capacity(members.len());
    {
        let mut guard = ContextGuard::new(evaluator);
        for member in members {
            let mut current = member.clone();
            loop {
                if values.contains_key(&current) {
                    break;
                }
                guard.set_member_context(&current);
                let value = guard.evaluate(expr)?;
                values.insert(current.clone(), value);
                if !with_parents {
                    break;
                }
                match current.parent() {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }
    }
    log::debug!(
        "evaluated {} members for sort in {:?}",
        values.len(),
        start.elapsed()
    );
    Ok(values)
}

/// Per-member value memo. An entry is present once the member has been
/// evaluated; evaluated NULLs are stored as [`Scalar::Null`], so absence
/// always means "not evaluated yet".
pub(crate) struct MemberMemo<M: Member> {
    values: AHashMap<M, Scalar<M>>,
}

impl<M: Member> MemberMemo<M> {
    pub fn new() -> Self {
        Self {
            values: AHashMap::new(),
        }
    }

    pub fn peek(&self, member: &M) -> Option<&Scalar<M>> {
        self.values.get(member)
    }

    pub fn preload(&mut self, values: impl IntoIterator<Item = (M, Scalar<M>)>) {
        self.values.extend(values);
    }

    pub fn get_or_eval<E>(
        &mut self,
        evaluator: &mut E,
        expr: &E::Expr,
        member: &M,
    ) -> SortResult<Scalar<M>>
    where
        E: Evaluator<Member = M>,
    {
        if let Some(value) = self.values.get(member) {
            return Ok(value.clone());
        }
        let value = evaluate_member(evaluator, expr, member)?;
        self.values.insert(member.clone(), value.clone());
        Ok(value)
    }
}

/// A tuple projected onto the expression's dependent positions.
pub(crate) type TupleKey<M> = SmallVec<[M; 4]>;

/// Per-tuple value memo with dependency pruning and a bounded cache.
pub(crate) struct TupleMemo<M: Member> {
    /// Positions whose hierarchy the expression depends on; computed once
    /// per sort, since all tuples share one hierarchy layout.
    positions: Option<SmallVec<[usize; 4]>>,
    cache: LruCache<TupleKey<M>, Scalar<M>>,
}

impl<M: Member> TupleMemo<M> {
    pub fn new() -> Self {
        Self::with_capacity(TUPLE_EVAL_CACHE_ENTRIES)
    }

    pub fn with_capacity(entries: usize) -> Self {
        Self {
            positions: None,
            cache: LruCache::new(entries),
        }
    }

    /// Projects a tuple onto the dependent positions. Two tuples with equal
    /// keys are interchangeable for this expression.
    pub fn key_for<X>(&mut self, expr: &X, tuple: &[M]) -> TupleKey<M>
    where
        X: Expression<M> + ?Sized,
    {
        let positions = self.positions.get_or_insert_with(|| {
            tuple
                .iter()
                .enumerate()
                .filter(|(_, member)| expr.depends_on(&member.hierarchy()))
                .map(|(position, _)| position)
                .collect()
        });
        positions.iter().map(|&position| tuple[position].clone()).collect()
    }

    /// Returns the memoized value for `key`, evaluating the full tuple
    /// context on a miss. A batch-quantum failure raised here propagates to
    /// the caller untouched.
    pub fn get_or_eval<E>(
        &mut self,
        evaluator: &mut E,
        expr: &E::Expr,
        key: TupleKey<M>,
        tuple: &[M],
    ) -> SortResult<Scalar<M>>
    where
        E: Evaluator<Member = M>,
    {
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.clone());
        }
        let value = {
            let mut guard = ContextGuard::new(evaluator);
            guard.set_tuple_context(tuple);
            guard.evaluate(expr)?
        };
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
