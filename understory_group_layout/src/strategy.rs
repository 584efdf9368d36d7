// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pluggable contributors of rows.
//!
//! Every re-index walks the engine's strategies in [`LayoutStrategy::order`]
//! and lets each one append flat slots and rows after the previous one. Line
//! queries ask the strategies in the same order and take the first non-empty
//! answer.

use core::fmt::Debug;

use smallvec::smallvec;

use crate::{
    AddRemoveResult, HierarchyAdapter, ItemFlags, ItemInfo, LayoutEngine, Row, RowKind,
};

/// A contributor of slots and rows to a [`LayoutEngine`].
pub trait LayoutStrategy<A: HierarchyAdapter>: Debug {
    /// Sort key; lower orders append their slots first.
    fn order(&self) -> i32;

    /// Short, stable name, used to find the strategy again.
    fn name(&self) -> &'static str;

    /// Appends this strategy's slots during a re-index.
    ///
    /// `current_count` is the number of flat slots appended so far and
    /// `total_lines` the number of rows; the strategy adds its rows to
    /// `total_lines` and returns the number of flat slots it appended.
    fn calculate_appended_slots(
        &mut self,
        engine: &mut LayoutEngine<A>,
        current_count: usize,
        total_lines: &mut usize,
    ) -> usize;

    /// Describes the items on row `slot`, shown at visible `line`.
    ///
    /// Returns an empty row if the slot does not belong to this strategy.
    fn build_item_infos(&self, engine: &LayoutEngine<A>, line: usize, slot: usize)
    -> Row<A::Item>;

    /// Called after rows were inserted by an incremental update.
    fn on_item_added(&mut self, result: AddRemoveResult) {
        let _ = result;
    }

    /// Called after rows were removed by an incremental update.
    fn on_item_removed(&mut self, result: AddRemoveResult) {
        let _ = result;
    }
}

/// Lays out the adapter's items. Installed on every engine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemsStrategy;

impl ItemsStrategy {
    /// Sort key of the items strategy. Item slots always come first.
    pub const ORDER: i32 = 0;
}

impl<A: HierarchyAdapter> LayoutStrategy<A> for ItemsStrategy {
    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn name(&self) -> &'static str {
        "items"
    }

    fn calculate_appended_slots(
        &mut self,
        engine: &mut LayoutEngine<A>,
        current_count: usize,
        total_lines: &mut usize,
    ) -> usize {
        engine.index_source_items(current_count, total_lines)
    }

    fn build_item_infos(
        &self,
        engine: &LayoutEngine<A>,
        _line: usize,
        slot: usize,
    ) -> Row<A::Item> {
        engine.item_infos_at_slot(slot)
    }
}

/// Appends one loading-indicator row after the items while the source
/// reports that more data is on its way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadingIndicatorStrategy {
    has_more_items: bool,
    row: Option<usize>,
}

impl LoadingIndicatorStrategy {
    /// Sort key of the loading indicator; after the items.
    pub const ORDER: i32 = 100;

    /// Creates the strategy. The indicator row exists while `has_more_items`.
    #[must_use]
    pub const fn new(has_more_items: bool) -> Self {
        Self {
            has_more_items,
            row: None,
        }
    }

    /// Whether the indicator is enabled.
    #[must_use]
    pub const fn has_more_items(&self) -> bool {
        self.has_more_items
    }

    /// Row slot of the indicator, if it is laid out.
    #[must_use]
    pub const fn row(&self) -> Option<usize> {
        self.row
    }
}

impl<A: HierarchyAdapter> LayoutStrategy<A> for LoadingIndicatorStrategy {
    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn name(&self) -> &'static str {
        "loading_indicator"
    }

    fn calculate_appended_slots(
        &mut self,
        _engine: &mut LayoutEngine<A>,
        _current_count: usize,
        total_lines: &mut usize,
    ) -> usize {
        if !self.has_more_items {
            self.row = None;
            return 0;
        }
        self.row = Some(*total_lines);
        *total_lines += 1;
        1
    }

    fn build_item_infos(
        &self,
        engine: &LayoutEngine<A>,
        _line: usize,
        slot: usize,
    ) -> Row<A::Item> {
        if self.row != Some(slot) {
            return Row::new();
        }
        smallvec![ItemInfo {
            item: None,
            id: engine.first_flat_slot_of_row(slot),
            slot,
            level: 0,
            kind: RowKind::LoadingIndicator,
            flags: ItemFlags::DISPLAYED,
        }]
    }

    fn on_item_added(&mut self, result: AddRemoveResult) {
        if let Some(row) = &mut self.row
            && result.start_slot <= *row
        {
            *row += result.slot_count;
        }
    }

    fn on_item_removed(&mut self, result: AddRemoveResult) {
        if let Some(row) = &mut self.row
            && result.start_slot < *row
        {
            *row = row.saturating_sub(result.slot_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LayoutStrategy, LoadingIndicatorStrategy};
    use crate::AddRemoveResult;

    type Strategy = dyn LayoutStrategy<alloc::vec::Vec<u32>>;

    #[test]
    fn indicator_row_follows_updates() {
        let mut loading = LoadingIndicatorStrategy::new(true);
        loading.row = Some(5);

        let strategy: &mut Strategy = &mut loading;
        strategy.on_item_added(AddRemoveResult::new(2, 3));
        assert_eq!(loading.row(), Some(8));

        let strategy: &mut Strategy = &mut loading;
        strategy.on_item_removed(AddRemoveResult::new(0, 2));
        assert_eq!(loading.row(), Some(6));

        // Changes after the indicator leave it alone.
        let strategy: &mut Strategy = &mut loading;
        strategy.on_item_removed(AddRemoveResult::new(7, 1));
        assert_eq!(loading.row(), Some(6));
    }
}
