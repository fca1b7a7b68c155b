//! In-place quicksort, quickselect, and partial sort over a fallible
//! comparator.
//!
//! [`Quicksorter`] is the workhorse behind partial sorting: `sort` is a plain
//! recursive quicksort, `select` moves the `limit` least elements (by the
//! comparator) to the front without ordering them, and `partial_sort` follows
//! a selection pass by sorting only that prefix, so the elements past the
//! boundary never pay the ordering cost. The comparator can fail (evaluation
//! errors, cancellation), so every comparison site propagates with `?`
//! instead of panicking inside a library sort.
//!
//! The engine is not stable; ties may reorder. Callers that need stability
//! decorate elements with their original index (see `partial.rs`) or use
//! [`stable_sort_by`], which drives the standard library's stable sort.

use std::cmp::Ordering;

use crate::error::SortResult;

/// Below this size a partition is finished with selection sort; the bookkeeping
/// of another partition pass costs more than the quadratic scan saves.
const TOO_SMALL: usize = 8;

/// Array-based quicksort/quickselect with a median-of-three pivot and a
/// two-pointer partition that uses the pivot itself as the scan sentinel.
pub(crate) struct Quicksorter<'a, T, C> {
    items: &'a mut [T],
    compare: C,
    comparisons: u64,
    exchanges: u64,
}

impl<'a, T, C> Quicksorter<'a, T, C>
where
    C: FnMut(&T, &T) -> SortResult<Ordering>,
{
    pub fn new(items: &'a mut [T], compare: C) -> Self {
        Self {
            items,
            compare,
            comparisons: 0,
            exchanges: 0,
        }
    }

    /// Sorts the whole slice in place.
    pub fn sort(&mut self) -> SortResult<()> {
        let end = self.items.len();
        self.sort_range(0, end)?;
        self.trace_counters("quicksort");
        Ok(())
    }

    /// Moves the `limit` least elements to `items[..limit]`, unordered.
    pub fn select(&mut self, limit: usize) -> SortResult<()> {
        let end = self.items.len();
        self.select_range(limit.min(end), 0, end)?;
        self.trace_counters("quickselect");
        Ok(())
    }

    /// Equivalent to a full sort truncated to `limit` elements: selects the
    /// least `limit`, then orders only that prefix.
    pub fn partial_sort(&mut self, limit: usize) -> SortResult<()> {
        if limit >= self.items.len() {
            return self.sort();
        }
        self.select_range(limit, 0, self.items.len())?;
        self.sort_range(0, limit)?;
        self.trace_counters("partial sort");
        Ok(())
    }

    fn less(&mut self, i: usize, j: usize) -> SortResult<bool> {
        self.comparisons += 1;
        Ok((self.compare)(&self.items[i], &self.items[j])? == Ordering::Less)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.exchanges += 1;
        self.items.swap(i, j);
    }

    fn sort_range(&mut self, start: usize, end: usize) -> SortResult<()> {
        if end - start < TOO_SMALL {
            return self.selection_sort(start, end);
        }
        let pivot = self.partition(start, end)?;
        self.sort_range(start, pivot)?;
        self.sort_range(pivot + 1, end)
    }

    /// Moves the `limit` least elements of `items[start..end]` to the front
    /// of that range, recursing only into the side of the partition that
    /// still straddles the rank boundary.
    fn select_range(&mut self, limit: usize, start: usize, end: usize) -> SortResult<()> {
        if limit == 0 || end - start <= limit {
            return Ok(());
        }
        if end - start < TOO_SMALL {
            return self.selection_sort(start, end);
        }
        let pivot = self.partition(start, end)?;
        // items[start..=pivot] are the least `left_size` elements of the range
        let left_size = pivot - start + 1;
        if limit < left_size {
            self.select_range(limit, start, pivot)
        } else if limit > left_size {
            self.select_range(limit - left_size, pivot + 1, end)
        } else {
            Ok(())
        }
    }

    /// Partitions `items[start..end]` around a median-of-three pivot and
    /// returns the pivot's final index: everything left of it compares no
    /// greater, everything right of it no less.
    ///
    /// The median of the first, middle, and last element is parked at
    /// `end - 1`, where it bounds the upward scan; the least of the three is
    /// parked at `start`, bounding the downward scan. Neither scan needs an
    /// explicit range check.
    fn partition(&mut self, start: usize, end: usize) -> SortResult<usize> {
        let mid = start + (end - start) / 2;
        let last = end - 1;
        if self.less(mid, start)? {
            self.swap(mid, start);
        }
        if self.less(last, start)? {
            self.swap(last, start);
        }
        if self.less(mid, last)? {
            self.swap(mid, last);
        }

        let pivot = last;
        let mut left = start + 1;
        let mut right = last - 1;
        loop {
            while self.less(left, pivot)? {
                left += 1;
            }
            while self.less(pivot, right)? {
                right -= 1;
            }
            if left >= right {
                break;
            }
            self.swap(left, right);
            left += 1;
            right -= 1;
        }
        self.swap(left, pivot);
        Ok(left)
    }

    fn selection_sort(&mut self, start: usize, end: usize) -> SortResult<()> {
        for i in start..end {
            let mut least = i;
            for j in (i + 1)..end {
                if self.less(j, least)? {
                    least = j;
                }
            }
            if least != i {
                self.swap(i, least);
            }
        }
        Ok(())
    }

    fn trace_counters(&mut self, label: &str) {
        log::trace!(
            "{label} over {} items: {} comparisons, {} exchanges",
            self.items.len(),
            self.comparisons,
            self.exchanges
        );
        self.comparisons = 0;
        self.exchanges = 0;
    }
}

/// Stable sort with a fallible comparator. The standard library sort cannot
/// unwind a `Result`, so the first failure is latched, the remaining
/// comparisons report `Equal` to finish cheaply, and the failure is returned
/// once the slice (now in unspecified order) is back in our hands.
pub(crate) fn stable_sort_by<T, C>(items: &mut [T], mut compare: C) -> SortResult<()>
where
    C: FnMut(&T, &T) -> SortResult<Ordering>,
{
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        match compare(a, b) {
            Ok(ord) => ord,
            Err(err) => {
                failure = Some(err);
                Ordering::Equal
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
