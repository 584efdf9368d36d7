// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Row descriptions handed to the presentation layer.

use smallvec::SmallVec;

use crate::RowKind;

bitflags::bitflags! {
    /// Per-row display and collapse state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ItemFlags: u8 {
        /// The row is on a visible line (not inside a collapsed group).
        const DISPLAYED       = 0b0000_0001;
        /// The row is a group header with at least one child.
        const COLLAPSIBLE     = 0b0000_0010;
        /// The row is a group header in the collapsed state.
        const COLLAPSED       = 0b0000_0100;
        /// The row shows aggregate values (a summary row, or a collapsed
        /// header when aggregates are shown inline).
        const SUMMARY_VISIBLE = 0b0000_1000;
    }
}

/// A transient, read-only description of one logical item on a row.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemInfo<T> {
    /// The item, or `None` for synthetic rows such as a loading indicator.
    pub item: Option<T>,
    /// Flat slot of the item.
    pub id: usize,
    /// Row slot the item is rendered on.
    pub slot: usize,
    /// Nesting level; root-level items are at level 0.
    pub level: usize,
    /// Row kind.
    pub kind: RowKind,
    /// Display and collapse flags.
    pub flags: ItemFlags,
}

impl<T> ItemInfo<T> {
    /// Returns `true` if this row is a collapsed group header.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.flags.contains(ItemFlags::COLLAPSED)
    }
}

/// All items rendered on one visual row, in order.
///
/// A compact row holds one item; stacked and wrapped rows hold several.
pub type Row<T> = SmallVec<[ItemInfo<T>; 4]>;

/// Which row slots an incremental update inserted or removed.
///
/// `start_slot..start_slot + slot_count` in row space; for compact layouts
/// rows and flat slots coincide. `slot_count` can be zero when a stacked or
/// wrapped row absorbed the change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct AddRemoveResult {
    /// First affected row slot.
    pub start_slot: usize,
    /// Number of row slots inserted or removed.
    pub slot_count: usize,
}

impl AddRemoveResult {
    /// Creates a result covering `slot_count` rows from `start_slot`.
    #[must_use]
    pub const fn new(start_slot: usize, slot_count: usize) -> Self {
        Self {
            start_slot,
            slot_count,
        }
    }
}
