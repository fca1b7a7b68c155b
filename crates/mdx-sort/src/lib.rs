#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Ordering and selection engine for MDX set functions.
//!
//! This crate implements the member- and tuple-ordering semantics behind
//! `Order`, `TopCount`, `BottomCount`, and `Hierarchize`:
//!
//! - a total order over sort-key scalars that deviates from IEEE comparison
//!   on purpose (`-inf < NULL < finite < NaN < +inf`, see
//!   [`compare_numeric`]);
//! - hierarchical comparison that walks two members to a common ancestor and
//!   resolves at the sibling level, by evaluated value, explicit order key,
//!   or dimension order ([`compare_hierarchically`]);
//! - memoized, dependency-pruned evaluation of sort-key expressions, so a
//!   comparison sort never evaluates the same member or tuple twice;
//! - adaptive partial selection for top-N/bottom-N requests that stays
//!   cheaper than a full sort when only a small prefix is needed.
//!
//! The dimensional model and the expression evaluator live outside this
//! crate; [`Member`], [`Expression`], and [`Evaluator`] are the narrow views
//! of them the engine consumes. The sort functions re-exported at the crate
//! root ([`sort_members`], [`partially_sort_tuples`], and friends) are the
//! API the query executor calls.
//!
//! All entry points share one `&mut` evaluation context for the duration of
//! a call, so a sort is single-threaded by construction; independent queries
//! use independent evaluators and comparators.

mod cache;
mod comparator;
mod error;
mod eval;
mod hierarchy;
mod memo;
mod model;
mod partial;
mod quicksort;
mod sorter;
mod value;

#[cfg(test)]
mod testutil;

pub use crate::comparator::{CompareKind, MemberComparator, TupleComparator};
pub use crate::error::{SortError, SortResult};
pub use crate::eval::{ContextGuard, Evaluator, Expression};
pub use crate::hierarchy::{
    compare_hierarchically, compare_order_keys, compare_sibling_members,
    compare_tuples_hierarchically, compare_with_sibling_rule,
};
pub use crate::model::{Member, OrderKey, SortKeySpec, SortOrder, Tuple};
pub use crate::sorter::{
    hierarchize_members, hierarchize_tuples, partially_sort_members, partially_sort_tuples,
    sort_members, sort_members_by_keys, sort_tuples, sort_tuples_by_keys,
};
pub use crate::value::{compare_numeric, compare_optional_values, compare_values, Scalar};
