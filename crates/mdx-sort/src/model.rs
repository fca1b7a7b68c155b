//! Collaborator traits and sort-request types.
//!
//! The dimensional model (hierarchies, members, levels) lives outside this
//! crate; [`Member`] is the narrow view of it the sorting engine needs.

use std::fmt;
use std::hash::Hash;

use crate::value::Scalar;

/// A member of a hierarchy, as exposed by the dimensional model.
///
/// The engine only navigates and compares members; it never creates or
/// mutates them. `Ord` must be the member's natural order (typically
/// unique-name order) and consistent with `Eq`: it is the final sibling
/// tie-break that keeps hierarchical comparison total.
pub trait Member: Clone + Eq + Hash + Ord + fmt::Debug {
    /// Opaque handle identifying the hierarchy a member belongs to.
    type Hierarchy: Clone + Eq + Hash;

    fn hierarchy(&self) -> Self::Hierarchy;

    /// Distance from the hierarchy root; root members have depth 0.
    fn depth(&self) -> u32;

    /// The parent member, or `None` for a root member.
    fn parent(&self) -> Option<Self>;

    /// Position among siblings as assigned by the dimension, or -1 when the
    /// dimension does not assign ordinals.
    fn ordinal(&self) -> i32;

    /// The externally assigned sibling order key, if the dimension defines
    /// one. Expected to be a plain scalar (number, text, or date).
    fn order_key(&self) -> Option<Scalar<Self>>;

    /// True for members defined by the query itself (calculated members),
    /// which collate after all stored members among their siblings.
    fn is_calculated_in_query(&self) -> bool;

    /// High-cardinality hierarchies are never hierarchized; the facade
    /// skips them with a diagnostic instead.
    fn is_high_cardinality(&self) -> bool {
        false
    }
}

/// Wraps a member so it sorts by the explicit order-key rule (calculated
/// members last, then assigned keys, then natural order) instead of by
/// generic sibling comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderKey<M>(pub M);

/// A fixed-arity combination of members, one per hierarchy. Every tuple in a
/// single sort shares the same arity and hierarchy layout.
pub type Tuple<M> = Vec<M>;

/// Direction and tie-break mode of one sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Ascending, keeping members grouped under their ancestors.
    Asc,
    /// Descending, keeping members grouped under their ancestors.
    Desc,
    /// Ascending over the flat member list, ignoring hierarchy.
    BreakAsc,
    /// Descending over the flat member list, ignoring hierarchy.
    BreakDesc,
}

impl SortOrder {
    pub fn is_descending(self) -> bool {
        matches!(self, SortOrder::Desc | SortOrder::BreakDesc)
    }

    pub fn breaks_hierarchy(self) -> bool {
        matches!(self, SortOrder::BreakAsc | SortOrder::BreakDesc)
    }
}

/// One (expression, direction) pair of a multi-key sort. Earlier specs
/// dominate later ones.
pub struct SortKeySpec<'a, X: ?Sized> {
    pub expr: &'a X,
    pub order: SortOrder,
}

impl<'a, X: ?Sized> SortKeySpec<'a, X> {
    pub fn new(expr: &'a X, order: SortOrder) -> Self {
        Self { expr, order }
    }
}

impl<X: ?Sized> Clone for SortKeySpec<'_, X> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<X: ?Sized> Copy for SortKeySpec<'_, X> {}
