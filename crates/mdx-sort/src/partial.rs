//! Stable partial sorting: the least `limit` elements, in sorted order, with
//! ties kept in input order.
//!
//! Three interchangeable strategies produce the identical output; which one
//! runs is decided by [`choose_strategy`] from the `limit / size` ratio
//! alone, so the thresholds can be tuned (and each strategy tested) in
//! isolation:
//!
//! - copying the whole input and stably sorting it wins once the prefix is a
//!   large share of the input, because the standard library sort is hard to
//!   beat and the truncated copy is pure overhead otherwise;
//! - for a middling share, quickselect over (element, index) pairs skips
//!   ordering everything past the boundary;
//! - for a tiny share, a bounded heap never materializes more than `limit`
//!   pairs at all, however large the input.

use std::cmp::Ordering;

use crate::error::SortResult;
use crate::quicksort::{stable_sort_by, Quicksorter};

/// How a stable partial sort is carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PartialSortStrategy {
    /// Copy, stable-sort everything, truncate.
    FullSort,
    /// Quickselect over (element, original index) pairs.
    PairedQuickselect,
    /// Fixed-capacity heap holding the current best `limit` elements.
    BoundedHeap,
}

/// Picks the cheapest strategy for keeping `limit` of `size` elements.
/// Thresholds were calibrated on member sets in the thousands; all three
/// choices return the same sequence.
pub(crate) fn choose_strategy(limit: usize, size: usize) -> PartialSortStrategy {
    let ratio = limit as f64 / size as f64;
    if ratio <= 0.05 {
        PartialSortStrategy::BoundedHeap
    } else if ratio <= 0.35 {
        PartialSortStrategy::PairedQuickselect
    } else {
        PartialSortStrategy::FullSort
    }
}

/// Returns the least `limit` elements of `items` in ascending comparator
/// order, preserving input order among ties. `limit` is clamped to the input
/// length; `limit == 0` yields an empty list.
pub(crate) fn stable_partial_sort<T, C>(
    items: &[T],
    compare: C,
    limit: usize,
) -> SortResult<Vec<T>>
where
    T: Clone,
    C: FnMut(&T, &T) -> SortResult<Ordering>,
{
    let limit = limit.min(items.len());
    if limit == 0 {
        return Ok(Vec::new());
    }
    let strategy = choose_strategy(limit, items.len());
    stable_partial_sort_using(strategy, items, compare, limit)
}

pub(crate) fn stable_partial_sort_using<T, C>(
    strategy: PartialSortStrategy,
    items: &[T],
    mut compare: C,
    limit: usize,
) -> SortResult<Vec<T>>
where
    T: Clone,
    C: FnMut(&T, &T) -> SortResult<Ordering>,
{
    let limit = limit.min(items.len());
    if limit == 0 {
        return Ok(Vec::new());
    }
    match strategy {
        PartialSortStrategy::FullSort => {
            let mut sorted = items.to_vec();
            stable_sort_by(&mut sorted, compare)?;
            sorted.truncate(limit);
            Ok(sorted)
        }
        PartialSortStrategy::PairedQuickselect => {
            let mut pairs: Vec<(&T, usize)> = items.iter().zip(0..).collect();
            Quicksorter::new(&mut pairs, |a: &(&T, usize), b: &(&T, usize)| {
                // index tie-break makes the unstable engine stable
                Ok(match compare(a.0, b.0)? {
                    Ordering::Equal => a.1.cmp(&b.1),
                    ord => ord,
                })
            })
            .partial_sort(limit)?;
            Ok(pairs[..limit].iter().map(|(item, _)| (*item).clone()).collect())
        }
        PartialSortStrategy::BoundedHeap => {
            let mut heap = BoundedWorstHeap::new(limit);
            for (index, item) in items.iter().enumerate() {
                heap.offer(item, index, &mut compare)?;
            }
            heap.into_sorted(&mut compare)
        }
    }
}

/// Fixed-capacity heap with the worst kept element on top, so a new element
/// only has to beat the root to be admitted. Entries carry their insertion
/// index; among comparator-equal elements the earlier one is the better, so
/// the kept set and its final order are exactly those of a stable full sort.
///
/// Hand-rolled rather than `BinaryHeap` because the comparator both fails
/// and mutates (it evaluates expressions through a memo).
struct BoundedWorstHeap<'a, T> {
    entries: Vec<(&'a T, usize)>,
    capacity: usize,
}

impl<'a, T> BoundedWorstHeap<'a, T> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn offer<C>(&mut self, item: &'a T, index: usize, compare: &mut C) -> SortResult<()>
    where
        C: FnMut(&T, &T) -> SortResult<Ordering>,
    {
        if self.entries.len() < self.capacity {
            self.entries.push((item, index));
            return self.sift_up(self.entries.len() - 1, compare);
        }
        // full: admit only an element better than the current worst
        let candidate = (item, index);
        if sorts_after(&candidate, &self.entries[0], compare)? {
            return Ok(());
        }
        self.entries[0] = candidate;
        self.sift_down(0, compare)
    }

    /// Drains worst-first; reversing the drain order yields the ascending,
    /// stable result.
    fn into_sorted<C>(mut self, compare: &mut C) -> SortResult<Vec<T>>
    where
        T: Clone,
        C: FnMut(&T, &T) -> SortResult<Ordering>,
    {
        let mut sorted = Vec::with_capacity(self.entries.len());
        while let Some(item) = self.pop_worst(compare)? {
            sorted.push(item.clone());
        }
        sorted.reverse();
        Ok(sorted)
    }

    /// Removes and returns the worst kept element.
    fn pop_worst<C>(&mut self, compare: &mut C) -> SortResult<Option<&'a T>>
    where
        C: FnMut(&T, &T) -> SortResult<Ordering>,
    {
        let last = match self.entries.len().checked_sub(1) {
            Some(last) => last,
            None => return Ok(None),
        };
        self.entries.swap(0, last);
        let popped = self.entries.pop();
        if !self.entries.is_empty() {
            self.sift_down(0, compare)?;
        }
        Ok(popped.map(|(item, _)| item))
    }

    fn sift_up<C>(&mut self, mut child: usize, compare: &mut C) -> SortResult<()>
    where
        C: FnMut(&T, &T) -> SortResult<Ordering>,
    {
        while child > 0 {
            let parent = (child - 1) / 2;
            if sorts_after(&self.entries[child], &self.entries[parent], compare)? {
                self.entries.swap(child, parent);
                child = parent;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn sift_down<C>(&mut self, mut parent: usize, compare: &mut C) -> SortResult<()>
    where
        C: FnMut(&T, &T) -> SortResult<Ordering>,
    {
        loop {
            let left = 2 * parent + 1;
            if left >= self.entries.len() {
                break;
            }
            let right = left + 1;
            let mut worst = left;
            if right < self.entries.len()
                && sorts_after(&self.entries[right], &self.entries[left], compare)?
            {
                worst = right;
            }
            if sorts_after(&self.entries[worst], &self.entries[parent], compare)? {
                self.entries.swap(parent, worst);
                parent = worst;
            } else {
                break;
            }
        }
        Ok(())
    }
}

/// Whether `a` belongs after `b` in the output: greater by the comparator,
/// or equal but inserted later. Total, since insertion indices are unique.
fn sorts_after<T, C>(a: &(&T, usize), b: &(&T, usize), compare: &mut C) -> SortResult<bool>
where
    C: FnMut(&T, &T) -> SortResult<Ordering>,
{
    Ok(match compare(a.0, b.0)? {
        Ordering::Equal => a.1 > b.1,
        ord => ord == Ordering::Greater,
    })
}
