//! Scalar sort-key values and the total order over them.
//!
//! MDX ordering deviates from IEEE float comparison on purpose: every value,
//! including NaN, infinities, and database NULL, must land in one
//! deterministic total order so that sorted result sets are reproducible.
//! The ascending numeric order is
//!
//! ```text
//! -inf < NULL < finite negatives < 0 < finite positives < NaN < +inf
//! ```
//!
//! with equal NaNs comparing equal. The general scalar order additionally
//! places the "not yet available" marker and the NULL sentinel below every
//! typed value, compares text case-insensitively, and treats any cross-kind
//! pairing as a hard error.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;

use crate::error::{SortError, SortResult};
use crate::hierarchy;
use crate::model::{Member, OrderKey};

/// A scalar produced by evaluating a sort-key expression.
///
/// `Number` wraps [`OrderedFloat`] so scalars are `Eq + Hash` and equal NaNs
/// hit the equality fast path. "Uncomputed" is deliberately not a variant:
/// memo maps represent it by absence, so an evaluated NULL (stored as
/// [`Scalar::Null`]) is never confused with a value that was simply not
/// evaluated yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scalar<M> {
    /// The expression evaluated to database NULL.
    Null,
    /// The backing cell has been requested but not yet loaded. Sorts next to
    /// `Null`; a sort that observes this value is going to be re-run once the
    /// pending batch resolves.
    Pending,
    Number(OrderedFloat<f64>),
    Text(Arc<str>),
    Date(NaiveDateTime),
    /// An explicit member order key, compared by the order-key rule rather
    /// than by generic sibling comparison.
    Key(OrderKey<M>),
}

impl<M> Scalar<M> {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(n.into_inner()),
            _ => None,
        }
    }
}

impl<M> From<f64> for Scalar<M> {
    fn from(value: f64) -> Self {
        Scalar::Number(OrderedFloat(value))
    }
}

impl<M> From<Option<f64>> for Scalar<M> {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Scalar::Null,
        }
    }
}

impl<M> From<&str> for Scalar<M> {
    fn from(value: &str) -> Self {
        Scalar::Text(Arc::from(value))
    }
}

impl<M> From<String> for Scalar<M> {
    fn from(value: String) -> Self {
        Scalar::Text(Arc::from(value.as_str()))
    }
}

impl<M> From<NaiveDateTime> for Scalar<M> {
    fn from(value: NaiveDateTime) -> Self {
        Scalar::Date(value)
    }
}

impl<M> From<OrderKey<M>> for Scalar<M> {
    fn from(value: OrderKey<M>) -> Self {
        Scalar::Key(value)
    }
}

impl<M: fmt::Debug> fmt::Display for Scalar<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Pending => write!(f, "(pending)"),
            Scalar::Number(n) => write!(f, "{}", n.into_inner()),
            Scalar::Text(s) => write!(f, "{s}"),
            Scalar::Date(d) => write!(f, "{d}"),
            Scalar::Key(k) => write!(f, "key({:?})", k.0),
        }
    }
}

/// Compares two numbers under the MDX numeric total order. `None` is the
/// synthetic null-as-number produced by aggregating over empty cells.
pub fn compare_numeric(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(b)) => {
            if b == f64::NEG_INFINITY {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Some(a), None) => {
            if a == f64::NEG_INFINITY {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (Some(a), Some(b)) => {
            if a.is_nan() {
                if b.is_nan() {
                    Ordering::Equal
                } else if b == f64::INFINITY {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            } else if b.is_nan() {
                if a == f64::INFINITY {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            } else {
                // NaN is excluded above, so partial_cmp always succeeds.
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        }
    }
}

/// Compares two scalars under the general total order.
///
/// `Pending` sorts below everything else, then `Null`, then typed values
/// compared kind-by-kind. A cross-kind pairing (other than with the two
/// sentinels) means a sort key produced inconsistent types and is reported as
/// [`SortError::IncomparableValues`].
pub fn compare_values<M: Member>(a: &Scalar<M>, b: &Scalar<M>) -> SortResult<Ordering> {
    use Scalar::*;
    if a == b {
        return Ok(Ordering::Equal);
    }
    match (a, b) {
        (Pending, _) => Ok(Ordering::Less),
        (_, Pending) => Ok(Ordering::Greater),
        (Null, _) => Ok(Ordering::Less),
        (_, Null) => Ok(Ordering::Greater),
        (Number(a), Number(b)) => Ok(compare_numeric(
            Some(a.into_inner()),
            Some(b.into_inner()),
        )),
        (Text(a), Text(b)) => Ok(cmp_text_case_insensitive(a, b)),
        (Date(a), Date(b)) => Ok(a.cmp(b)),
        (Key(a), Key(b)) => hierarchy::compare_order_keys(a, b),
        (a, b) => Err(SortError::IncomparableValues {
            left: a.to_string(),
            right: b.to_string(),
        }),
    }
}

/// Compares possibly-absent scalars. `None` stands for "never evaluated" and
/// sorts below every evaluated value, including `Pending` and `Null`.
pub fn compare_optional_values<M: Member>(
    a: Option<&Scalar<M>>,
    b: Option<&Scalar<M>>,
) -> SortResult<Ordering> {
    match (a, b) {
        (None, None) => Ok(Ordering::Equal),
        (None, Some(_)) => Ok(Ordering::Less),
        (Some(_), None) => Ok(Ordering::Greater),
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn cmp_text_case_insensitive(a: &str, b: &str) -> Ordering {
    if a.is_ascii() && b.is_ascii() {
        return a
            .as_bytes()
            .iter()
            .map(u8::to_ascii_uppercase)
            .cmp(b.as_bytes().iter().map(u8::to_ascii_uppercase));
    }
    a.chars()
        .flat_map(char::to_uppercase)
        .cmp(b.chars().flat_map(char::to_uppercase))
}
