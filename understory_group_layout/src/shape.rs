// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapping between flat slots and visual rows for each [`LayoutShape`].
//!
//! A compact row holds one flat slot. A stacked row holds up to
//! `stack_count` leaves of one bottom-level group; headers always take a row
//! of their own. A wrapped row holds as many leaves as fit across the
//! available opposite length.

use alloc::vec::Vec;
use core::ops::Range;

use understory_slot_index::OffsetIndex;

use crate::config::validate_length;
use crate::engine::TARGET;
use crate::{AddRemoveResult, GroupNode, HierarchyAdapter, LayoutEngine, LayoutError, LayoutShape};

/// Row-breaking tables of a wrap layout.
#[derive(Clone, Debug, Default)]
pub(crate) struct WrapState {
    /// Opposite-axis length of each item flat slot.
    opposite: OffsetIndex,
    /// First flat slot of each item row.
    row_starts: Vec<usize>,
    /// Unused opposite-axis length at the end of each item row.
    padding: OffsetIndex,
}

impl WrapState {
    pub(crate) fn new(shape: &LayoutShape) -> Self {
        let default_opposite = match *shape {
            LayoutShape::Wrap {
                default_item_opposite_length,
                ..
            } => default_item_opposite_length,
            _ => 0.0,
        };
        Self {
            opposite: OffsetIndex::new(default_opposite),
            row_starts: Vec::new(),
            padding: OffsetIndex::new(0.0),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.opposite.clear();
        self.row_starts.clear();
        self.padding.clear();
    }

    /// Forgets every measured opposite length and sizes the table to `len`.
    pub(crate) fn reset_opposite(&mut self, len: usize) {
        self.opposite = OffsetIndex::with_len(len, self.opposite.default_length());
    }

    pub(crate) fn insert_items(&mut self, flat: usize, count: usize) {
        self.opposite.insert_range(flat, None, count);
    }

    pub(crate) fn remove_items(&mut self, flat: usize, count: usize) {
        self.opposite.remove_range(flat, count);
    }

    pub(crate) fn row_count(&self) -> usize {
        self.row_starts.len()
    }
}

impl<A: HierarchyAdapter> LayoutEngine<A> {
    pub(crate) fn stack_count(&self) -> usize {
        match self.config.shape {
            LayoutShape::Stacked { stack_count } => stack_count.get(),
            _ => 1,
        }
    }

    pub(crate) fn is_stacked(&self) -> bool {
        matches!(self.config.shape, LayoutShape::Stacked { .. })
    }

    pub(crate) fn is_wrap(&self) -> bool {
        matches!(self.config.shape, LayoutShape::Wrap { .. })
    }

    /// Whether the leaves directly below `node` (the root for `None`) share
    /// stacked rows.
    pub(crate) fn stacks_children(&self, node: Option<&GroupNode<A::Item>>) -> bool {
        self.is_stacked()
            && match node {
                None => self.options.group_levels == 0,
                Some(node) => node.level + 1 == self.options.group_levels,
            }
    }

    /// Whether flat slot `flat` heads a group with items below it.
    ///
    /// The header table also holds nodes with a span of one; those render
    /// as plain items.
    pub(crate) fn is_header_slot(&self, flat: usize) -> bool {
        self.headers
            .get(flat)
            .and_then(|&id| self.nodes.get(id))
            .is_some_and(|node| node.span() > 1)
    }

    /// Number of rows the source items occupy, appended rows excluded.
    #[must_use]
    pub fn flat_row_count(&self) -> usize {
        self.item_row_count
    }

    /// The row that renders flat slot `flat`.
    #[must_use]
    pub fn row_of_flat_slot(&self, flat: usize) -> usize {
        if flat >= self.item_slot_count {
            return self.item_row_count + (flat - self.item_slot_count);
        }
        match self.config.shape {
            LayoutShape::Compact => flat,
            LayoutShape::Stacked { stack_count } => self.stacked_row_of(flat, stack_count.get()),
            LayoutShape::Wrap { .. } => self
                .wrap
                .row_starts
                .partition_point(|&start| start <= flat)
                .saturating_sub(1),
        }
    }

    /// The first flat slot rendered on `row`.
    #[must_use]
    pub fn first_flat_slot_of_row(&self, row: usize) -> usize {
        if row >= self.item_row_count {
            return self.item_slot_count + (row - self.item_row_count);
        }
        match self.config.shape {
            LayoutShape::Compact => row,
            LayoutShape::Stacked { stack_count } => {
                self.stacked_first_flat_of(row, stack_count.get())
            }
            LayoutShape::Wrap { .. } => self.wrap.row_starts.get(row).copied().unwrap_or(row),
        }
    }

    /// Flat slots rendered on `row`.
    pub(crate) fn flat_slots_on_row(&self, row: usize) -> Range<usize> {
        let first = self.first_flat_slot_of_row(row);
        if first >= self.item_slot_count {
            return first..first + 1;
        }
        match self.config.shape {
            LayoutShape::Compact => first..first + 1,
            LayoutShape::Stacked { stack_count } => {
                if self.is_header_slot(first) {
                    return first..first + 1;
                }
                let owner = self.owner_of(first).and_then(|id| self.nodes.get(id));
                if !self.stacks_children(owner) {
                    return first..first + 1;
                }
                let end = owner.map_or(self.item_slot_count, |node| node.last_sub_item_slot + 1);
                first..(first + stack_count.get()).min(end)
            }
            LayoutShape::Wrap { .. } => {
                let end = self
                    .wrap
                    .row_starts
                    .get(row + 1)
                    .copied()
                    .unwrap_or(self.item_slot_count);
                first..end
            }
        }
    }

    fn stacked_row_of(&self, flat: usize, stack_count: usize) -> usize {
        if stack_count == 1 {
            return flat;
        }
        if self.options.group_levels == 0 {
            return flat / stack_count;
        }
        let mut cursor = 0;
        let mut row = 0;
        for (header, _, &id) in self.headers.runs() {
            if header < cursor {
                continue;
            }
            if header > flat {
                break;
            }
            row += header - cursor;
            if header == flat {
                return row;
            }
            match self.nodes.get(id) {
                Some(node) if self.stacks_children(Some(node)) => {
                    let last = node.last_sub_item_slot;
                    if flat <= last {
                        return row + 1 + (flat - header - 1) / stack_count;
                    }
                    row += 1 + (last - header).div_ceil(stack_count);
                    cursor = last + 1;
                }
                _ => {
                    row += 1;
                    cursor = header + 1;
                }
            }
        }
        row + (flat - cursor)
    }

    fn stacked_first_flat_of(&self, row: usize, stack_count: usize) -> usize {
        if stack_count == 1 {
            return row;
        }
        if self.options.group_levels == 0 {
            return row * stack_count;
        }
        let mut cursor = 0;
        let mut current = 0;
        for (header, _, &id) in self.headers.runs() {
            if header < cursor {
                continue;
            }
            let plain = header - cursor;
            if row < current + plain {
                return cursor + (row - current);
            }
            current += plain;
            if row == current {
                return header;
            }
            match self.nodes.get(id) {
                Some(node) if self.stacks_children(Some(node)) => {
                    let last = node.last_sub_item_slot;
                    let child_rows = (last - header).div_ceil(stack_count);
                    if row <= current + child_rows {
                        return header + 1 + (row - current - 1) * stack_count;
                    }
                    current += 1 + child_rows;
                    cursor = last + 1;
                }
                _ => {
                    current += 1;
                    cursor = header + 1;
                }
            }
        }
        cursor + (row - current)
    }

    // --- Wrap -------------------------------------------------------------

    /// Recomputes the wrap row breaks from the item opposite lengths.
    ///
    /// Group headers take a full row. Every other item, an indexed group
    /// with a span of one included, packs left to right while the running
    /// length stays within the available opposite length; an item wider
    /// than the available length gets a row of its own.
    pub(crate) fn reflow(&mut self) {
        let LayoutShape::Wrap {
            available_opposite_length: available,
            ..
        } = self.config.shape
        else {
            return;
        };

        self.wrap.row_starts.clear();
        let mut paddings = Vec::new();
        let mut used = 0.0;
        let mut open = false;
        for flat in 0..self.item_slot_count {
            if self.is_header_slot(flat) {
                if open {
                    paddings.push((available - used).max(0.0));
                    open = false;
                }
                self.wrap.row_starts.push(flat);
                paddings.push(0.0);
                continue;
            }
            let length = self.wrap.opposite.value_for_index(flat).unwrap_or(0.0);
            if open && used + length > available {
                paddings.push((available - used).max(0.0));
                open = false;
            }
            if !open {
                self.wrap.row_starts.push(flat);
                used = 0.0;
                open = true;
            }
            used += length;
        }
        if open {
            paddings.push((available - used).max(0.0));
        }

        self.wrap.padding = OffsetIndex::with_len(paddings.len(), 0.0);
        for (row, padding) in paddings.into_iter().enumerate() {
            if padding > 0.0 {
                self.wrap.padding.update(row, padding);
            }
        }
    }

    /// Reflows and rebuilds every item row's tables.
    ///
    /// Measured row lengths of item rows are dropped because their contents
    /// changed; appended rows keep theirs.
    #[tracing::instrument(skip_all, target = "understory_group_layout::engine", level = "debug")]
    pub(crate) fn relayout_rows(&mut self) {
        let old = self.item_row_count;
        self.reflow();
        let new = self.wrap.row_count();
        self.item_row_count = new;
        self.offsets.remove_range(0, old);
        self.offsets.insert_range(0, None, new);
        self.total_slot_count = self.total_slot_count - old + new;
        match new.cmp(&old) {
            core::cmp::Ordering::Greater => {
                self.notify_added(AddRemoveResult::new(old, new - old));
            }
            core::cmp::Ordering::Less => {
                self.notify_removed(AddRemoveResult::new(new, old - new));
            }
            core::cmp::Ordering::Equal => {}
        }
        self.rebuild_collapsed_rows();
        tracing::debug!(target: TARGET, old_rows = old, rows = new, "reflowed wrap rows");
    }

    /// The available opposite length of a wrap layout.
    #[must_use]
    pub fn available_opposite_length(&self) -> Option<f64> {
        match self.config.shape {
            LayoutShape::Wrap {
                available_opposite_length,
                ..
            } => Some(available_opposite_length),
            _ => None,
        }
    }

    /// Changes the room available across the scroll axis and reflows.
    pub fn set_available_opposite_length(&mut self, length: f64) -> Result<(), LayoutError> {
        validate_length(length, "available opposite length")?;
        let LayoutShape::Wrap {
            available_opposite_length,
            ..
        } = &mut self.config.shape
        else {
            return Err(LayoutError::InvalidConfig(
                "available opposite length applies to wrap layouts",
            ));
        };
        if *available_opposite_length == length {
            return Ok(());
        }
        *available_opposite_length = length;
        self.relayout_rows();
        Ok(())
    }

    /// Records the measured opposite-axis length of item flat slot `flat`
    /// and reflows. Ignored outside wrap layouts.
    pub fn update_opposite_length(&mut self, flat: usize, length: f64) {
        debug_assert!(length.is_finite() && length >= 0.0, "invalid length {length}");
        if !self.is_wrap() || flat >= self.item_slot_count {
            return;
        }
        if self.wrap.opposite.value_for_index(flat) == Some(length) {
            return;
        }
        self.wrap.opposite.update(flat, length);
        self.relayout_rows();
    }

    /// Unused opposite-axis length at the end of wrap row `row`.
    #[must_use]
    pub fn row_padding(&self, row: usize) -> Option<f64> {
        if !self.is_wrap() {
            return None;
        }
        self.wrap.padding.value_for_index(row)
    }
}
