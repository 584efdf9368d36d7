// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A 1D strip abstraction and the visible-window helper built on it.

/// Result of a visibility query over a 1D strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleStrip {
    /// First visible index (inclusive).
    pub start: usize,
    /// One past the last visible index (exclusive).
    pub end: usize,

    /// Total extent of items before `start`.
    pub before_extent: f64,
    /// Total extent of items after `end`.
    pub after_extent: f64,
    /// Total extent of the entire strip (all items `0..len`).
    pub content_extent: f64,
}

impl VisibleStrip {
    const EMPTY: Self = Self {
        start: 0,
        end: 0,
        before_extent: 0.0,
        after_extent: 0.0,
        content_extent: 0.0,
    };

    /// Returns `true` if there are no visible items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A 1D model over a dense strip of items, indexed `0..len`.
///
/// All extents and offsets are in the same coordinate space as your scroll offset
/// and viewport extent (typically logical pixels).
pub trait ExtentModel {
    /// Number of items in this strip.
    fn len(&self) -> usize;

    /// Returns `true` if there are no items in this strip.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total extent of the entire strip.
    fn total_extent(&self) -> f64;

    /// Size of a single item. Zero-sized items are allowed.
    fn extent_of(&self, index: usize) -> f64;

    /// Offset of the start of the given item from the start of the strip.
    ///
    /// Implementations must guarantee that `offset_of(0) == 0` and that
    /// `offset_of(i + 1) >= offset_of(i) + extent_of(i)`.
    fn offset_of(&self, index: usize) -> f64;

    /// Given an offset, find the index of the item that starts at or before it,
    /// clamped into `0..len()`.
    fn index_at_offset(&self, offset: f64) -> usize;
}

/// Compute the visible slice of a strip, given scroll position, viewport size, and overscan.
///
/// - `scroll_offset`: top of the viewport in strip coordinates (`>= 0`).
/// - `viewport_extent`: size of the viewport in strip coordinates (`>= 0`).
/// - `overscan_before`: extra margin *before* the viewport to reduce popping.
/// - `overscan_after`: extra margin *after* the viewport to reduce popping.
///
/// The returned [`VisibleStrip`] tells you which indices to materialize
/// (`[start, end)`), how much padding lies before and after them, and the total
/// content extent. Zero-sized items at the edges of the window are skipped.
pub fn compute_visible_strip<M>(
    model: &M,
    scroll_offset: f64,
    viewport_extent: f64,
    overscan_before: f64,
    overscan_after: f64,
) -> VisibleStrip
where
    M: ExtentModel + ?Sized,
{
    let len = model.len();
    if len == 0 {
        return VisibleStrip::EMPTY;
    }

    let content_extent = model.total_extent().max(0.0);
    if content_extent == 0.0 {
        // Everything hidden or unmeasured at zero; treat as empty.
        return VisibleStrip::EMPTY;
    }

    let scroll_offset = scroll_offset.max(0.0);
    let min = (scroll_offset - overscan_before.max(0.0)).max(0.0);
    let max = (scroll_offset + viewport_extent.max(0.0) + overscan_after.max(0.0))
        .min(content_extent);

    if max <= min {
        return VisibleStrip {
            start: 0,
            end: 0,
            before_extent: min,
            after_extent: (content_extent - min).max(0.0),
            content_extent,
        };
    }

    let mut start = model.index_at_offset(min).min(len - 1);
    while start > 0 && model.offset_of(start) > min {
        start -= 1;
    }
    while start + 1 < len && model.extent_of(start) == 0.0 {
        start += 1;
    }

    let mut end = start;
    while end < len && model.offset_of(end) < max {
        end += 1;
    }

    let before_extent = model.offset_of(start);
    let end_start = if end < len {
        model.offset_of(end)
    } else {
        content_extent
    };

    VisibleStrip {
        start,
        end,
        before_extent,
        after_extent: (content_extent - end_start).max(0.0),
        content_extent,
    }
}
