// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A sparse, run-compressed mapping from slot indices to values.

use alloc::vec::Vec;

/// One maximal run of indices `start..=end` sharing a value.
#[derive(Clone, Debug, PartialEq)]
struct Run<T> {
    start: usize,
    end: usize,
    value: T,
}

impl<T> Run<T> {
    const fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// An ordered, sparse mapping from non-negative indices to values of type `T`.
///
/// Most indices are implicitly absent. Present indices are stored as runs of
/// consecutive indices with equal values, so a table marking one huge range
/// costs a single entry. Adjacent runs holding equal values are merged.
///
/// Structural edits ([`insert_indexes`](Self::insert_indexes),
/// [`remove_indexes_and_values`](Self::remove_indexes_and_values)) shift every
/// later run, keeping the table aligned with a strip that grows or shrinks in
/// the middle. Point and range queries binary-search the runs and read a
/// cached running count, so they cost `O(log runs)`.
///
/// Mutations cost `O(runs)`: they splice the run vector and refresh the
/// running count from the edit point on. The tables this backs hold one run
/// per collapsed range or group header, which stays small next to the slot
/// count, and the vector keeps queries cache friendly.
///
/// Operations with a zero `count` are no-ops, and queries past the last run
/// report "absent" rather than panicking.
#[derive(Clone, Debug)]
pub struct IntervalValueIndex<T> {
    runs: Vec<Run<T>>,
    /// `covered_before[i]` is the number of indices covered by `runs[..i]`.
    covered_before: Vec<usize>,
}

impl<T> Default for IntervalValueIndex<T> {
    fn default() -> Self {
        Self {
            runs: Vec::new(),
            covered_before: alloc::vec![0],
        }
    }
}

impl<T> IntervalValueIndex<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no index carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of stored runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Total number of indices that carry a value.
    #[must_use]
    pub fn total_index_count(&self) -> usize {
        self.covered_before[self.runs.len()]
    }

    /// Removes every run.
    pub fn clear(&mut self) {
        self.runs.clear();
        self.covered_before.clear();
        self.covered_before.push(0);
    }

    /// Returns `true` if `index` carries a value.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.run_containing(index).is_some()
    }

    /// Returns the value stored at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.run_containing(index).map(|i| &self.runs[i].value)
    }

    /// Looks up `index`, falling back to the closest run before it.
    ///
    /// Returns the start of the run that contains `index` (or, when `index` is
    /// absent, of the last run ending before it) together with that run's
    /// value. Callers that store one entry per group header use this to find
    /// the header at or before a child slot.
    #[must_use]
    pub fn lower_bound(&self, index: usize) -> Option<(usize, &T)> {
        let after = self.runs.partition_point(|r| r.start <= index);
        let run = self.runs.get(after.checked_sub(1)?)?;
        Some((run.start, &run.value))
    }

    /// Iterates over all runs as `(start, end_inclusive, value)`, in index order.
    pub fn runs(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        self.runs.iter().map(|r| (r.start, r.end, &r.value))
    }

    /// Iterates over the runs that end at or after `index`, in index order.
    pub fn runs_from(&self, index: usize) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        let first = self.first_run_ending_at_or_after(index);
        self.runs[first..].iter().map(|r| (r.start, r.end, &r.value))
    }

    /// Number of indices in `start..=end` that carry a value.
    #[must_use]
    pub fn index_count(&self, start: usize, end: usize) -> usize {
        if start > end {
            return 0;
        }
        self.covered_below(end.saturating_add(1)) - self.covered_below(start)
    }

    /// Number of indices in `from..to` that carry *no* value.
    ///
    /// With a table of collapsed slots, `count_not_included(0, slot)` is the
    /// number of visible slots before `slot`.
    #[must_use]
    pub fn count_not_included(&self, from: usize, to: usize) -> usize {
        if from >= to {
            return 0;
        }
        (to - from) - self.index_count(from, to - 1)
    }

    /// The closest index after `index` that carries no value.
    #[must_use]
    pub fn next_gap(&self, index: usize) -> usize {
        self.gap_at_or_after(index.saturating_add(1))
    }

    /// The closest index at or after `index` that carries no value.
    #[must_use]
    pub fn gap_at_or_after(&self, index: usize) -> usize {
        let mut candidate = index;
        while let Some(i) = self.run_containing(candidate) {
            candidate = self.runs[i].end.saturating_add(1);
        }
        candidate
    }

    /// The closest index before `index` that carries no value, if any.
    #[must_use]
    pub fn previous_gap(&self, index: usize) -> Option<usize> {
        let mut candidate = index.checked_sub(1)?;
        while let Some(i) = self.run_containing(candidate) {
            candidate = self.runs[i].start.checked_sub(1)?;
        }
        Some(candidate)
    }

    /// The `n`-th (zero-based) index that carries no value.
    ///
    /// This is the inverse of [`count_not_included`](Self::count_not_included):
    /// for a table of collapsed slots it maps a visible line to its slot.
    #[must_use]
    pub fn nth_gap(&self, n: usize) -> usize {
        // Gaps before run `k` grow monotonically with `k`.
        let gaps_before = |k: usize| self.runs[k].start - self.covered_before[k];
        let (mut lo, mut hi) = (0, self.runs.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if gaps_before(mid) <= n {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        n + self.covered_before[lo]
    }

    fn first_run_ending_at_or_after(&self, index: usize) -> usize {
        self.runs.partition_point(|r| r.end < index)
    }

    fn run_containing(&self, index: usize) -> Option<usize> {
        let i = self.first_run_ending_at_or_after(index);
        (i < self.runs.len() && self.runs[i].start <= index).then_some(i)
    }

    /// Number of covered indices strictly below `bound`.
    fn covered_below(&self, bound: usize) -> usize {
        let i = self.first_run_ending_at_or_after(bound);
        let partial = match self.runs.get(i) {
            Some(run) if run.start < bound => bound - run.start,
            _ => 0,
        };
        self.covered_before[i] + partial
    }

    fn recount_from(&mut self, first: usize) {
        let first = first.min(self.runs.len());
        self.covered_before.truncate(first + 1);
        let mut total = self.covered_before[first];
        for run in &self.runs[first..] {
            total += run.len();
            self.covered_before.push(total);
        }
    }
}

impl<T: Clone + PartialEq> IntervalValueIndex<T> {
    /// Stores `value` at every index in `start..start + count`.
    ///
    /// Values previously stored in that range are replaced. The new run merges
    /// with neighbors that hold an equal value.
    pub fn add_values(&mut self, start: usize, count: usize, value: T) {
        if count == 0 {
            return;
        }
        let end = start + count - 1;
        let pos = self.clear_range(start, end);
        self.runs.insert(pos, Run { start, end, value });
        self.merge_around(pos);
        self.recount_from(pos.saturating_sub(1));
    }

    /// Clears every value in `start..start + count` without shifting anything.
    pub fn remove_values(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let pos = self.clear_range(start, start + count - 1);
        self.recount_from(pos.saturating_sub(1));
    }

    /// Inserts `count` absent indices at `start`, shifting later runs forward.
    ///
    /// A run that spans `start` is split around the inserted indices.
    pub fn insert_indexes(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let first = self.first_run_ending_at_or_after(start);
        let mut shift_from = first;
        if let Some(run) = self.runs.get_mut(first)
            && run.start < start
        {
            let tail = Run {
                start: start + count,
                end: run.end + count,
                value: run.value.clone(),
            };
            run.end = start - 1;
            self.runs.insert(first + 1, tail);
            shift_from = first + 2;
        }
        for run in &mut self.runs[shift_from..] {
            run.start += count;
            run.end += count;
        }
        self.recount_from(first);
    }

    /// Inserts `count` indices at `start` that all carry `value`.
    pub fn insert_indexes_and_values(&mut self, start: usize, count: usize, value: T) {
        self.insert_indexes(start, count);
        self.add_values(start, count, value);
    }

    /// Deletes the indices `start..start + count`, shifting later runs back.
    ///
    /// Runs overlapping the deleted range are truncated. A range extending past
    /// the last run is clipped.
    pub fn remove_indexes_and_values(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let pos = self.clear_range(start, start.saturating_add(count - 1));
        for run in &mut self.runs[pos..] {
            run.start -= count;
            run.end -= count;
        }
        if pos < self.runs.len() {
            self.merge_around(pos);
        }
        self.recount_from(pos.saturating_sub(1));
    }

    /// Removes coverage of `start..=end`, splitting boundary runs.
    ///
    /// Returns the position of the first run after the cleared range.
    fn clear_range(&mut self, start: usize, end: usize) -> usize {
        let first = self.first_run_ending_at_or_after(start);
        let mut last = first;
        while last < self.runs.len() && self.runs[last].start <= end {
            last += 1;
        }
        if first == last {
            return first;
        }

        let mut pieces = Vec::with_capacity(2);
        let head = &self.runs[first];
        if head.start < start {
            pieces.push(Run {
                start: head.start,
                end: start - 1,
                value: head.value.clone(),
            });
        }
        let tail = &self.runs[last - 1];
        if tail.end > end {
            pieces.push(Run {
                start: end + 1,
                end: tail.end,
                value: tail.value.clone(),
            });
        }
        let kept_head = usize::from(pieces.first().is_some_and(|p| p.start < start));
        self.runs.splice(first..last, pieces);
        first + kept_head
    }

    /// Merges the run at `pos` with equal, touching neighbors.
    fn merge_around(&mut self, pos: usize) {
        if pos + 1 < self.runs.len() {
            let (left, right) = self.runs.split_at_mut(pos + 1);
            let run = &mut left[pos];
            if run.end + 1 == right[0].start && run.value == right[0].value {
                run.end = right[0].end;
                self.runs.remove(pos + 1);
            }
        }
        if pos > 0 {
            let (left, right) = self.runs.split_at_mut(pos);
            let prev = &mut left[pos - 1];
            if prev.end + 1 == right[0].start && prev.value == right[0].value {
                prev.end = right[0].end;
                self.runs.remove(pos);
            }
        }
    }
}
