//! Hierarchical member comparison.
//!
//! Members of one hierarchy are ordered by their traversal position: the two
//! members are walked up to a common ancestor, and the comparison resolves at
//! the last pair of distinct ancestors, which are siblings. `post` selects
//! post-order traversal (parents after their children) instead of pre-order.
//!
//! The walk itself is shared; what varies is how a sibling tie is resolved.
//! [`compare_hierarchically`] resolves purely structurally (ordinal / order
//! key / natural order); the expression-driven comparators inject their own
//! resolution via [`compare_with_sibling_rule`].

use std::cmp::Ordering;

use crate::error::{SortError, SortResult};
use crate::model::{Member, OrderKey};
use crate::value;

/// Compares two members of one hierarchy by traversal position. Total: for
/// distinct members the result is never `Equal`, and a sibling resolution
/// claiming otherwise reports the hierarchy as malformed.
pub fn compare_hierarchically<M: Member>(a: &M, b: &M, post: bool) -> SortResult<Ordering> {
    compare_with_sibling_rule(a, b, post, |x, y| {
        let ord = compare_sibling_members(x, y)?;
        if ord == Ordering::Equal {
            return Err(SortError::MalformedHierarchy(format!(
                "sibling comparison failed to order distinct members {x:?} and {y:?}"
            )));
        }
        Ok(ord)
    })
}

/// Compares two tuples by traversal position, earlier positions dominant.
/// Tuples in one comparison set share the same arity and hierarchy layout.
pub fn compare_tuples_hierarchically<M: Member>(
    a: &[M],
    b: &[M],
    post: bool,
) -> SortResult<Ordering> {
    for (ma, mb) in a.iter().zip(b.iter()) {
        let ord = compare_hierarchically(ma, mb, post)?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

/// The hierarchical walk with an injectable sibling-tie rule.
///
/// `resolve_siblings` is called exactly once per comparison, with two
/// distinct children of a common parent (or two distinct roots). Each walk
/// step must strictly decrease depth; a parent chain that does not is
/// reported as malformed rather than looping forever.
pub fn compare_with_sibling_rule<M, F>(
    a: &M,
    b: &M,
    post: bool,
    mut resolve_siblings: F,
) -> SortResult<Ordering>
where
    M: Member,
    F: FnMut(&M, &M) -> SortResult<Ordering>,
{
    if a == b {
        return Ok(Ordering::Equal);
    }
    let mut a = a.clone();
    let mut b = b.clone();
    loop {
        let depth_a = a.depth();
        let depth_b = b.depth();
        if depth_a > depth_b {
            a = step_up(&a)?;
            if a == b {
                // b is an ancestor of the original a
                return Ok(if post { Ordering::Less } else { Ordering::Greater });
            }
        } else if depth_b > depth_a {
            b = step_up(&b)?;
            if a == b {
                return Ok(if post { Ordering::Greater } else { Ordering::Less });
            }
        } else {
            match (a.parent(), b.parent()) {
                // two roots: the pre-walk members are the siblings
                (None, None) => return resolve_siblings(&a, &b),
                (Some(parent_a), Some(parent_b)) => {
                    if parent_a == parent_b {
                        return resolve_siblings(&a, &b);
                    }
                    if parent_a.depth() >= depth_a || parent_b.depth() >= depth_b {
                        return Err(SortError::MalformedHierarchy(format!(
                            "parents of {a:?} and {b:?} do not decrease depth"
                        )));
                    }
                    a = parent_a;
                    b = parent_b;
                }
                _ => {
                    return Err(SortError::MalformedHierarchy(format!(
                        "members {a:?} and {b:?} report equal depth {depth_a} \
                         but only one has a parent"
                    )))
                }
            }
        }
    }
}

fn step_up<M: Member>(member: &M) -> SortResult<M> {
    let parent = member.parent().ok_or_else(|| {
        SortError::MalformedHierarchy(format!(
            "member {member:?} reports depth {} but has no parent",
            member.depth()
        ))
    })?;
    if parent.depth() >= member.depth() {
        return Err(SortError::MalformedHierarchy(format!(
            "parent {parent:?} does not decrease depth below {member:?}"
        )));
    }
    Ok(parent)
}

/// Compares two children of a common parent.
///
/// Calculated members collate after stored members. Stored members compare
/// by explicit order key when both carry one, otherwise by dimension
/// ordinal; only when ordinals tie (for example, both unassigned) does the
/// member's natural order decide.
pub fn compare_sibling_members<M: Member>(a: &M, b: &M) -> SortResult<Ordering> {
    match (a.is_calculated_in_query(), b.is_calculated_in_query()) {
        (true, false) => return Ok(Ordering::Greater),
        (false, true) => return Ok(Ordering::Less),
        _ => {}
    }
    if let (Some(key_a), Some(key_b)) = (a.order_key(), b.order_key()) {
        return value::compare_values(&key_a, &key_b);
    }
    let (ord_a, ord_b) = (a.ordinal(), b.ordinal());
    Ok(if ord_a == ord_b {
        a.cmp(b)
    } else if ord_a < ord_b {
        Ordering::Less
    } else {
        Ordering::Greater
    })
}

/// Compares two explicit order keys: calculated members last, then the
/// assigned keys when both are present, then the members' natural order.
/// Unlike sibling comparison, a tie between two assigned keys is reported
/// as-is rather than falling back further.
pub fn compare_order_keys<M: Member>(a: &OrderKey<M>, b: &OrderKey<M>) -> SortResult<Ordering> {
    let (member_a, member_b) = (&a.0, &b.0);
    match (
        member_a.is_calculated_in_query(),
        member_b.is_calculated_in_query(),
    ) {
        (true, false) => return Ok(Ordering::Greater),
        (false, true) => return Ok(Ordering::Less),
        _ => {}
    }
    if let (Some(key_a), Some(key_b)) = (member_a.order_key(), member_b.order_key()) {
        return value::compare_values(&key_a, &key_b);
    }
    Ok(member_a.cmp(member_b))
}
