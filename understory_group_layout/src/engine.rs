// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The layout engine: tables, full re-index, queries, and collapse state.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::num::NonZeroUsize;

use hashbrown::{HashMap, HashSet};
use understory_slot_index::{IntervalValueIndex, OffsetIndex, VisibleStrip, compute_visible_strip};

use crate::config::validate_length;
use crate::event::Listeners;
use crate::lines::Lines;
use crate::node::GroupArena;
use crate::shape::WrapState;
use crate::{
    GroupNode, HierarchyAdapter, ItemFlags, ItemInfo, ItemsStrategy, LayoutConfig, LayoutError,
    LayoutEvent, LayoutShape, LayoutStrategy, ListenerId, NodeId, Row, RowKind, SourceOptions,
};

pub(crate) const TARGET: &str = "understory_group_layout::engine";

/// Flat slots and rows occupied by one counted subtree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SubtreeCount {
    /// Flat slots, the subtree root included.
    pub slots: usize,
    /// Visual rows the subtree renders as.
    pub rows: usize,
}

/// A virtualized, grouped layout over a [`HierarchyAdapter`].
///
/// The engine keeps three tables in sync with the source:
///
/// - a header table mapping each indexed group's flat slot to its
///   [`GroupNode`], plus an identity registry from item to node;
/// - a collapsed-range table over row slots;
/// - an [`OffsetIndex`] with the physical length of each row slot.
///
/// All coordinates taken and returned by the public API are *row slots*
/// unless a method says otherwise. For [`LayoutShape::Compact`] row slots and
/// flat slots coincide.
pub struct LayoutEngine<A: HierarchyAdapter> {
    pub(crate) adapter: A,
    pub(crate) config: LayoutConfig,
    pub(crate) options: SourceOptions,
    pub(crate) nodes: GroupArena<A::Item>,
    pub(crate) registry: HashMap<A::Item, NodeId>,
    pub(crate) headers: IntervalValueIndex<NodeId>,
    pub(crate) collapsed: IntervalValueIndex<bool>,
    pub(crate) offsets: OffsetIndex,
    pub(crate) wrap: WrapState,
    pub(crate) item_slot_count: usize,
    pub(crate) item_row_count: usize,
    pub(crate) flat_slot_count: usize,
    pub(crate) total_slot_count: usize,
    pub(crate) visible_line_count: usize,
    pub(crate) average_item_length: f64,
    pub(crate) strategies: Vec<Box<dyn LayoutStrategy<A>>>,
    pub(crate) listeners: Listeners<A::Item>,
}

impl<A: HierarchyAdapter> fmt::Debug for LayoutEngine<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("groups", &self.registry.len())
            .field("flat_slot_count", &self.flat_slot_count)
            .field("total_slot_count", &self.total_slot_count)
            .field("visible_line_count", &self.visible_line_count)
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

impl<A: HierarchyAdapter> LayoutEngine<A> {
    /// Creates an engine over `adapter` and indexes it with `options`.
    ///
    /// The engine starts with an [`ItemsStrategy`] installed.
    pub fn new(adapter: A, config: LayoutConfig, options: SourceOptions) -> Result<Self, LayoutError> {
        config.validate()?;
        let mut engine = Self {
            adapter,
            config,
            options,
            nodes: GroupArena::default(),
            registry: HashMap::new(),
            headers: IntervalValueIndex::new(),
            collapsed: IntervalValueIndex::new(),
            offsets: OffsetIndex::new(config.default_item_length),
            wrap: WrapState::new(&config.shape),
            item_slot_count: 0,
            item_row_count: 0,
            flat_slot_count: 0,
            total_slot_count: 0,
            visible_line_count: 0,
            average_item_length: config.default_item_length,
            strategies: alloc::vec![Box::new(ItemsStrategy)],
            listeners: Listeners::default(),
        };
        engine.reindex(options);
        Ok(engine)
    }

    /// The data source.
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Mutable access to the data source.
    ///
    /// Changes made through this reference must be reported with
    /// [`add_item`](Self::add_item), [`remove_item`](Self::remove_item), or
    /// [`reload`](Self::reload).
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// The options of the last re-index, normalized.
    #[must_use]
    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Replaces the data source and re-indexes it. Returns the previous one.
    pub fn set_source(&mut self, source: A, options: SourceOptions) -> A {
        let previous = core::mem::replace(&mut self.adapter, source);
        self.reindex(options);
        previous
    }

    /// Re-indexes the current data source from scratch.
    pub fn reload(&mut self, options: SourceOptions) {
        self.reindex(options);
    }

    /// Switches to a stacked layout with `stack_count` leaves per row.
    ///
    /// Every row boundary moves, so this runs a full re-index. Collapse
    /// state is kept.
    pub fn set_stack_count(&mut self, stack_count: NonZeroUsize) {
        self.config.shape = LayoutShape::Stacked { stack_count };
        self.reindex(self.options.restoring_collapsed(true));
    }

    /// Changes the length assumed for unmeasured rows.
    pub fn set_default_item_length(&mut self, length: f64) -> Result<(), LayoutError> {
        validate_length(length, "default item length")?;
        self.config.default_item_length = length;
        self.offsets.set_default_length(length);
        Ok(())
    }

    #[tracing::instrument(skip_all, target = "understory_group_layout::engine", level = "debug")]
    pub(crate) fn reindex(&mut self, options: SourceOptions) {
        let options = options.normalized();
        let saved: HashSet<A::Item> = if options.restore_collapsed {
            self.collapsed_items().cloned().collect()
        } else {
            HashSet::new()
        };
        self.options = options;
        self.clear_tables();

        let mut strategies = core::mem::take(&mut self.strategies);
        let mut flat_slots = 0;
        let mut total_lines = 0;
        for strategy in &mut strategies {
            flat_slots += strategy.calculate_appended_slots(self, flat_slots, &mut total_lines);
        }
        self.strategies = strategies;
        self.flat_slot_count = flat_slots;
        self.total_slot_count = total_lines;
        self.offsets = OffsetIndex::with_len(total_lines, self.config.default_item_length);

        for item in &saved {
            if let Some(&id) = self.registry.get(item)
                && let Some(node) = self.nodes.get_mut(id)
                && node.span() > 1
            {
                node.is_expanded = false;
            }
        }
        self.rebuild_collapsed_rows();

        tracing::debug!(
            target: TARGET,
            flat_slots,
            rows = total_lines,
            groups = self.registry.len(),
            restored = saved.len(),
            "re-indexed source"
        );
        self.listeners.emit(&LayoutEvent::ItemsSourceChanged);
    }

    fn clear_tables(&mut self) {
        self.nodes.clear();
        self.registry.clear();
        self.headers.clear();
        self.collapsed.clear();
        self.offsets.clear();
        self.wrap.clear();
        self.item_slot_count = 0;
        self.item_row_count = 0;
        self.flat_slot_count = 0;
        self.total_slot_count = 0;
        self.visible_line_count = 0;
    }

    /// Counts and indexes the adapter's items from flat slot `start_slot`.
    ///
    /// Called by [`ItemsStrategy`] during a re-index. Adds the item rows to
    /// `total_lines` and returns the number of flat slots.
    pub fn index_source_items(&mut self, start_slot: usize, total_lines: &mut usize) -> usize {
        debug_assert_eq!(start_slot, 0, "item slots come before appended slots");
        let levels = self.options.group_levels;
        let mut slots = 0;
        let mut rows = 0;
        let mut should_index = false;
        for i in 0..self.adapter.child_count(None) {
            let Some(item) = self.adapter.child_at(None, i) else {
                continue;
            };
            let counted = self.count_and_populate_tables(
                &item,
                start_slot + slots,
                0,
                levels,
                None,
                should_index,
                None,
            );
            should_index |= counted.slots > 1;
            slots += counted.slots;
            rows += counted.rows;
        }
        self.item_slot_count = slots;
        if self.stacks_children(None) {
            rows = slots.div_ceil(self.stack_count());
        }
        if self.is_wrap() {
            self.wrap.reset_opposite(slots);
            self.reflow();
            rows = self.wrap.row_count();
        }
        self.item_row_count = rows;
        *total_lines += rows;
        slots
    }

    /// Counts the subtree under `item` at flat slot `root_slot` and indexes
    /// its groups.
    ///
    /// Children are walked while `level < max_levels`. A node is indexed
    /// when its subtree spans more than one slot, or when
    /// `should_index_item` says an earlier sibling already needed indexing.
    ///
    /// With a `collector`, new nodes are allocated and pushed to it instead
    /// of being entered into the header table; the caller registers them
    /// once the existing headers have been shifted out of the way.
    pub fn count_and_populate_tables(
        &mut self,
        item: &A::Item,
        root_slot: usize,
        level: usize,
        max_levels: usize,
        parent: Option<NodeId>,
        should_index_item: bool,
        mut collector: Option<&mut Vec<NodeId>>,
    ) -> SubtreeCount {
        let child_count = if level < max_levels {
            self.adapter.child_count(Some(item))
        } else {
            0
        };
        if child_count == 0 && !should_index_item {
            return SubtreeCount { slots: 1, rows: 1 };
        }

        let id = self
            .nodes
            .insert(GroupNode::new(item.clone(), parent, level, root_slot));
        let mut slots = 1;
        let mut child_rows = 0;
        let mut should_index_children = false;
        for i in 0..child_count {
            let Some(child) = self.adapter.child_at(Some(item), i) else {
                continue;
            };
            let counted = self.count_and_populate_tables(
                &child,
                root_slot + slots,
                level + 1,
                max_levels,
                Some(id),
                should_index_children,
                collector.as_deref_mut(),
            );
            should_index_children |= counted.slots > 1;
            slots += counted.slots;
            child_rows += counted.rows;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.last_sub_item_slot = root_slot + slots - 1;
        }

        let stacked = self.is_stacked() && level + 1 == max_levels;
        let rows = 1 + if stacked {
            (slots - 1).div_ceil(self.stack_count())
        } else {
            child_rows
        };
        match collector {
            Some(collector) => collector.push(id),
            None => self.register(id),
        }
        SubtreeCount { slots, rows }
    }

    /// Enters an allocated node into the header table and the registry.
    pub(crate) fn register(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        self.headers.add_values(node.index, 1, id);
        if let Some(previous) = self.registry.insert(node.item.clone(), id)
            && previous != id
        {
            tracing::warn!(
                target: TARGET,
                item = ?node.item,
                "item appears more than once in the source; the later copy wins"
            );
        }
    }

    // --- Counts -----------------------------------------------------------

    /// Total row slots, appended strategy rows included.
    #[must_use]
    pub fn total_slot_count(&self) -> usize {
        self.total_slot_count
    }

    /// Total flat slots, appended strategy slots included.
    #[must_use]
    pub fn flat_slot_count(&self) -> usize {
        self.flat_slot_count
    }

    /// Number of rows not hidden by a collapsed group.
    #[must_use]
    pub fn visible_line_count(&self) -> usize {
        self.visible_line_count
    }

    /// Number of indexed groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.registry.len()
    }

    // --- Groups -----------------------------------------------------------

    /// The indexed group node for `item`.
    #[must_use]
    pub fn group_info(&self, item: &A::Item) -> Option<&GroupNode<A::Item>> {
        self.registry.get(item).and_then(|&id| self.nodes.get(id))
    }

    /// The node behind `id`, if it is still alive.
    #[must_use]
    pub fn group(&self, id: NodeId) -> Option<&GroupNode<A::Item>> {
        self.nodes.get(id)
    }

    /// Iterates over the indexed groups in slot order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupNode<A::Item>> + '_ {
        self.headers
            .runs()
            .filter_map(|(_, _, &id)| self.nodes.get(id))
    }

    /// The item of the indexed group that contains `item`'s group node.
    ///
    /// Only indexed groups know their parent; leaves return `None`.
    #[must_use]
    pub fn parent_of(&self, item: &A::Item) -> Option<&A::Item> {
        let parent = self.group_info(item)?.parent?;
        self.nodes.get(parent).map(|node| &node.item)
    }

    /// Returns `true` if `item` is an indexed group in the collapsed state.
    #[must_use]
    pub fn is_collapsed(&self, item: &A::Item) -> bool {
        self.group_info(item).is_some_and(|node| !node.is_expanded)
    }

    /// Returns `true` if every ancestor of `item`'s group is expanded.
    ///
    /// Unindexed items return `false`.
    #[must_use]
    pub fn is_group_visible(&self, item: &A::Item) -> bool {
        self.registry
            .get(item)
            .is_some_and(|&id| self.is_node_visible(id))
    }

    pub(crate) fn is_node_visible(&self, id: NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            let Some(node) = self.nodes.get(parent) else {
                return false;
            };
            if !node.is_expanded {
                return false;
            }
            current = node.parent;
        }
        true
    }

    fn collapsed_items(&self) -> impl Iterator<Item = &A::Item> + '_ {
        self.registry
            .keys()
            .filter(|item| self.is_collapsed(item))
    }

    // --- Flat slot lookup -------------------------------------------------

    /// The innermost indexed group whose subtree contains `flat` below its
    /// header, or `None` for root-level slots.
    pub(crate) fn owner_of(&self, flat: usize) -> Option<NodeId> {
        let (_, &id) = self.headers.lower_bound(flat)?;
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.nodes.get(id)?;
            if node.owns_child_slot(flat) {
                return Some(id);
            }
            current = node.parent;
        }
        None
    }

    fn children_start(&self, owner: Option<NodeId>) -> usize {
        owner
            .and_then(|id| self.nodes.get(id))
            .map_or(0, |node| node.index + 1)
    }

    /// The child index of `flat` within `owner`.
    pub(crate) fn child_ordinal(&self, owner: Option<NodeId>, flat: usize) -> usize {
        let start = self.children_start(owner);
        let mut ordinal = flat - start;
        for (slot, _, &id) in self.headers.runs_from(start) {
            if slot >= flat {
                break;
            }
            if let Some(node) = self.nodes.get(id)
                && node.parent == owner
            {
                ordinal -= node.span() - 1;
            }
        }
        ordinal
    }

    /// The flat slot of child `ordinal` within `owner`.
    ///
    /// `ordinal` may equal the child count, which addresses the slot right
    /// after the last child.
    pub(crate) fn child_slot(&self, owner: Option<NodeId>, ordinal: usize) -> usize {
        let start = self.children_start(owner);
        let end = owner
            .and_then(|id| self.nodes.get(id))
            .map_or(self.item_slot_count, |node| node.last_sub_item_slot + 1);
        let mut skipped = 0;
        // First slot not inside an already skipped child group.
        let mut next = start;
        for (slot, _, &id) in self.headers.runs_from(start) {
            if slot >= end {
                break;
            }
            if slot < next {
                continue;
            }
            if slot - start - skipped >= ordinal {
                break;
            }
            if let Some(node) = self.nodes.get(id)
                && node.parent == owner
            {
                skipped += node.span() - 1;
                next = node.last_sub_item_slot + 1;
            }
        }
        start + ordinal + skipped
    }

    /// Number of leaf slots directly below `owner` in a stacking group.
    pub(crate) fn stacked_leaf_count(&self, owner: Option<NodeId>) -> usize {
        owner
            .and_then(|id| self.nodes.get(id))
            .map_or(self.item_slot_count, |node| node.span() - 1)
    }

    // --- Item infos -------------------------------------------------------

    /// Describes the items rendered on row `slot`.
    ///
    /// Returns an empty row for slots that hold no source items.
    #[must_use]
    pub fn item_infos_at_slot(&self, slot: usize) -> Row<A::Item> {
        if slot >= self.item_row_count {
            return Row::new();
        }
        let displayed = !self.collapsed.contains(slot);
        self.flat_slots_on_row(slot)
            .filter_map(|flat| self.item_info_at_flat(flat, slot, displayed))
            .collect()
    }

    /// Describes the item at flat slot `flat`.
    #[must_use]
    pub fn item_at_slot(&self, flat: usize) -> Option<ItemInfo<A::Item>> {
        if flat >= self.item_slot_count {
            return None;
        }
        let row = self.row_of_flat_slot(flat);
        self.item_info_at_flat(flat, row, !self.collapsed.contains(row))
    }

    fn item_info_at_flat(
        &self,
        flat: usize,
        row: usize,
        displayed: bool,
    ) -> Option<ItemInfo<A::Item>> {
        let mut flags = ItemFlags::empty();
        flags.set(ItemFlags::DISPLAYED, displayed);

        let (item, level) = if let Some(node) = self.headers.get(flat).and_then(|&id| self.nodes.get(id)) {
            flags.set(ItemFlags::COLLAPSIBLE, node.span() > 1);
            flags.set(ItemFlags::COLLAPSED, !node.is_expanded);
            (node.item.clone(), node.level)
        } else {
            let owner = self.owner_of(flat);
            let owner_node = owner.and_then(|id| self.nodes.get(id));
            let ordinal = self.child_ordinal(owner, flat);
            let item = self
                .adapter
                .child_at(owner_node.map(|node| &node.item), ordinal)?;
            (item, owner_node.map_or(0, |node| node.level + 1))
        };

        let kind = self.adapter.row_kind(&item);
        let summary = match kind {
            RowKind::Subtotal | RowKind::GrandTotal => true,
            RowKind::Header => {
                flags.contains(ItemFlags::COLLAPSED) && self.options.show_aggregate_values_inline
            }
            RowKind::BottomLevel | RowKind::LoadingIndicator => false,
        };
        flags.set(ItemFlags::SUMMARY_VISIBLE, summary);

        Some(ItemInfo {
            item: Some(item),
            id: flat,
            slot: row,
            level,
            kind,
            flags,
        })
    }

    /// Iterates over rows from visible `start_line`, forward or backward.
    ///
    /// Each step yields the items of one row, collapsed rows skipped. The
    /// iterator is empty if `start_line` is out of range.
    #[must_use]
    pub fn lines(&self, start_line: usize, forward: bool) -> Lines<'_, A> {
        Lines::new(self, start_line, self.slot_at_visible_line(start_line), forward)
    }

    // --- Visible lines ----------------------------------------------------

    /// The visible line of row `slot`: the slot minus the collapsed rows
    /// before it.
    #[must_use]
    pub fn visible_slot(&self, slot: usize) -> usize {
        slot.saturating_sub(self.collapsed.index_count(0, slot))
    }

    /// The row slot rendered at visible `line`.
    #[must_use]
    pub fn slot_at_visible_line(&self, line: usize) -> Option<usize> {
        (line < self.visible_line_count).then(|| self.collapsed.nth_gap(line))
    }

    /// The first visible row slot after `slot`.
    #[must_use]
    pub fn next_visible_slot(&self, slot: usize) -> Option<usize> {
        let next = self.collapsed.next_gap(slot);
        (next < self.total_slot_count).then_some(next)
    }

    /// The last visible row slot before `slot`.
    #[must_use]
    pub fn previous_visible_slot(&self, slot: usize) -> Option<usize> {
        self.collapsed.previous_gap(slot)
    }

    /// Number of collapsed rows in `start..=end`.
    #[must_use]
    pub fn collapsed_slots_count(&self, start: usize, end: usize) -> usize {
        self.collapsed.index_count(start, end)
    }

    /// Returns `true` if row `slot` is hidden by a collapsed group.
    #[must_use]
    pub fn is_slot_collapsed(&self, slot: usize) -> bool {
        self.collapsed.contains(slot)
    }

    // --- Collapse state ---------------------------------------------------

    /// Collapses the group of `item`.
    ///
    /// Only an indexed, expanded, visible group with children collapses.
    /// Returns `true` if the state changed.
    pub fn collapse(&mut self, item: &A::Item) -> bool {
        let Some(&id) = self.registry.get(item) else {
            return false;
        };
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if !node.is_expanded || node.span() < 2 || !self.is_node_visible(id) {
            return false;
        }
        let rows = self.subtree_rows(node);
        if let Some(node) = self.nodes.get_mut(id) {
            node.is_expanded = false;
        }
        let Some((start, end)) = rows else {
            return true;
        };

        let count = end - start + 1;
        let newly = count - self.collapsed.index_count(start, end);
        self.collapsed.add_values(start, count, true);
        self.offsets.set_hidden(start, count, true);
        self.visible_line_count -= newly;

        tracing::trace!(target: TARGET, ?item, start, hidden = newly, "collapsed group");
        self.listeners.emit(&LayoutEvent::Collapsed {
            item: item.clone(),
            start_slot: start,
            count: newly,
        });
        true
    }

    /// Expands the group of `item`.
    ///
    /// Descendant groups that were collapsed on their own stay collapsed.
    /// Returns `true` if the state changed.
    pub fn expand(&mut self, item: &A::Item) -> bool {
        let Some(&id) = self.registry.get(item) else {
            return false;
        };
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if node.is_expanded {
            return false;
        }
        node.is_expanded = true;
        if !self.is_node_visible(id) {
            // Rows stay hidden by the collapsed ancestor.
            return true;
        }
        let Some(node) = self.nodes.get(id) else {
            return true;
        };
        let Some((start, end)) = self.subtree_rows(node) else {
            return true;
        };
        let (first, last) = (node.index, node.last_sub_item_slot);

        let count = end - start + 1;
        let before = self.collapsed.index_count(start, end);
        self.collapsed.remove_values(start, count);
        self.offsets.set_hidden(start, count, false);
        self.hide_collapsed_groups(first + 1, last);
        let revealed = before - self.collapsed.index_count(start, end);
        self.visible_line_count += revealed;

        tracing::trace!(target: TARGET, ?item, start, revealed, "expanded group");
        self.listeners.emit(&LayoutEvent::Expanded {
            item: item.clone(),
            start_slot: start,
            count: revealed,
        });
        true
    }

    /// Re-hides the rows of collapsed groups with a header in flat
    /// `from..=last` that are visible themselves.
    fn hide_collapsed_groups(&mut self, from: usize, last: usize) {
        let ranges: Vec<(usize, usize)> = self
            .headers
            .runs_from(from)
            .take_while(|&(slot, _, _)| slot <= last)
            .filter_map(|(_, _, &id)| {
                let node = self.nodes.get(id)?;
                (!node.is_expanded && self.is_node_visible(id))
                    .then(|| self.subtree_rows(node))
                    .flatten()
            })
            .collect();
        for (start, end) in ranges {
            self.collapsed.add_values(start, end - start + 1, true);
            self.offsets.set_hidden(start, end - start + 1, true);
        }
    }

    /// Rebuilds the collapsed-range table from the nodes' own state.
    pub(crate) fn rebuild_collapsed_rows(&mut self) {
        self.collapsed.clear();
        self.offsets.set_hidden(0, self.offsets.len(), false);
        if let Some(last) = self.item_slot_count.checked_sub(1) {
            self.hide_collapsed_groups(0, last);
        }
        self.visible_line_count = self.total_slot_count - self.collapsed.total_index_count();
    }

    /// Rows below `node`'s header row through the row of its last slot.
    pub(crate) fn subtree_rows(&self, node: &GroupNode<A::Item>) -> Option<(usize, usize)> {
        if node.span() < 2 {
            return None;
        }
        let start = self.row_of_flat_slot(node.index) + 1;
        let end = self.row_of_flat_slot(node.last_sub_item_slot);
        (end >= start).then_some((start, end))
    }

    // --- Physical lengths -------------------------------------------------

    /// Converts a physical offset to a fractional row position.
    ///
    /// With `include_collapsed` the integer part counts hidden rows as well;
    /// otherwise it is a visible line.
    #[must_use]
    pub fn slot_from_physical_offset(&self, offset: f64, include_collapsed: bool) -> f64 {
        if self.total_slot_count == 0 {
            return 0.0;
        }
        let index = self.offsets.index_from_offset(offset);
        if index == 0 {
            let first = self.offsets.offset_from_index(0);
            return if first > 0.0 { offset / first } else { 0.0 };
        }
        let mut length = self.offsets.value_for_index(index).unwrap_or(0.0);
        if length <= 0.0 {
            length = self.config.default_item_length;
        }
        let logical = if include_collapsed {
            index
        } else {
            index - self.collapsed.index_count(0, index)
        };
        let into = offset - self.offsets.offset_from_index(index - 1);
        if length > 0.0 {
            logical as f64 + into / length
        } else {
            logical as f64
        }
    }

    /// Offset of the trailing edge of row `slot`.
    #[must_use]
    pub fn physical_offset_from_slot(&self, slot: usize) -> f64 {
        self.offsets.offset_from_index(slot)
    }

    /// Length of row `slot`, measured or default. `None` if out of range.
    #[must_use]
    pub fn physical_length_for_slot(&self, slot: usize) -> Option<f64> {
        self.offsets.value_for_index(slot)
    }

    /// Rendered length of all rows; collapsed rows contribute nothing.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.offsets.total_length()
    }

    /// Records the measured length of row `slot`.
    pub fn update_slot_length(&mut self, slot: usize, length: f64) {
        debug_assert!(length.is_finite() && length >= 0.0, "invalid length {length}");
        if slot < self.offsets.len() {
            self.offsets.update(slot, length);
        }
    }

    /// Folds the realized rows `start..=end` into the average row length.
    ///
    /// Rows hidden by a collapsed group are not realized and do not count.
    /// The average only moves when the realized rows cover a different
    /// length than the running average predicts for them.
    pub fn update_average_length(&mut self, start: usize, end: usize) {
        if start > end || end >= self.offsets.len() {
            return;
        }
        let shown = end - start + 1 - self.collapsed.index_count(start, end);
        if shown == 0 {
            return;
        }
        let count = shown as f64;
        let realized = self.offsets.offset_from_index(end) - self.offsets.offset_before(start);
        if realized <= 0.0 {
            return;
        }
        let average = realized / count;
        if (average - self.average_item_length).abs() > f64::EPSILON {
            self.average_item_length = average;
            tracing::trace!(target: TARGET, average, "average row length changed");
        }
    }

    /// Average measured row length, or the default before any update.
    #[must_use]
    pub fn average_item_length(&self) -> f64 {
        self.average_item_length
    }

    /// The rows to realize for a viewport, as row slots.
    ///
    /// `overscan_before` and `overscan_after` extend the window by that much
    /// physical length on either side.
    #[must_use]
    pub fn visible_window(
        &self,
        scroll_offset: f64,
        viewport_extent: f64,
        overscan_before: f64,
        overscan_after: f64,
    ) -> VisibleStrip {
        compute_visible_strip(
            &self.offsets,
            scroll_offset,
            viewport_extent,
            overscan_before,
            overscan_after,
        )
    }

    // --- Strategies and listeners -----------------------------------------

    /// Installs a strategy and re-indexes, keeping collapse state.
    pub fn add_strategy(&mut self, strategy: Box<dyn LayoutStrategy<A>>) {
        let at = self
            .strategies
            .partition_point(|existing| existing.order() <= strategy.order());
        self.strategies.insert(at, strategy);
        self.reindex(self.options.restoring_collapsed(true));
    }

    /// Removes every strategy matching `pred` and re-indexes, keeping
    /// collapse state. Returns the number of removed strategies.
    pub fn remove_strategies_where(
        &mut self,
        mut pred: impl FnMut(&dyn LayoutStrategy<A>) -> bool,
    ) -> usize {
        let before = self.strategies.len();
        self.strategies.retain(|strategy| !pred(strategy.as_ref()));
        let removed = before - self.strategies.len();
        if removed > 0 {
            self.reindex(self.options.restoring_collapsed(true));
        }
        removed
    }

    /// Installed strategies, in order.
    pub fn strategies(&self) -> impl Iterator<Item = &dyn LayoutStrategy<A>> + '_ {
        self.strategies
            .iter()
            .map(|strategy| &**strategy as &dyn LayoutStrategy<A>)
    }

    pub(crate) fn notify_added(&mut self, result: crate::AddRemoveResult) {
        for strategy in &mut self.strategies {
            strategy.on_item_added(result);
        }
    }

    pub(crate) fn notify_removed(&mut self, result: crate::AddRemoveResult) {
        for strategy in &mut self.strategies {
            strategy.on_item_removed(result);
        }
    }

    /// Registers a listener for [`LayoutEvent`]s.
    pub fn connect(&mut self, listener: impl FnMut(&LayoutEvent<A::Item>) + 'static) -> ListenerId {
        self.listeners.connect(Box::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not connected.
    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        self.listeners.disconnect(id)
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use crate::testing::Tree;
    use crate::{
        HierarchyAdapter, ItemFlags, LayoutConfig, LayoutEngine, LayoutError, LayoutEvent,
        LoadingIndicatorStrategy, RowKind, SourceOptions,
    };

    fn compact<A: HierarchyAdapter>(adapter: A) -> LayoutEngine<A> {
        LayoutEngine::new(adapter, LayoutConfig::new(), SourceOptions::default()).unwrap()
    }

    /// G0 { S0 { a b } S1 { c } } G1 { d }, ids in slot order.
    fn nested() -> Tree {
        let mut tree = Tree::new();
        let g0 = tree.push(None);
        let s0 = tree.push(Some(g0));
        tree.push(Some(s0));
        tree.push(Some(s0));
        let s1 = tree.push(Some(g0));
        tree.push(Some(s1));
        let g1 = tree.push(None);
        tree.push(Some(g1));
        tree
    }

    fn record(engine: &mut LayoutEngine<Tree>) -> Rc<RefCell<Vec<LayoutEvent<u32>>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.connect(move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn flat_list_yields_rows_in_order() {
        let engine = compact((10..15).collect::<Vec<u32>>());
        assert_eq!(engine.total_slot_count(), 5);
        assert_eq!(engine.visible_line_count(), 5);
        assert_eq!(engine.group_count(), 0);
        let rows: Vec<_> = engine.lines(0, true).collect();
        assert_eq!(rows.len(), 5);
        for ((slot, item), row) in (0..).zip(10_u32..).zip(&rows) {
            assert_eq!(row.len(), 1);
            assert_eq!(row[0].item, Some(item));
            assert_eq!(row[0].slot, slot);
            assert_eq!(row[0].kind, RowKind::BottomLevel);
            assert_eq!(row[0].flags, ItemFlags::DISPLAYED);
        }
    }

    #[test]
    fn collapsing_a_group_hides_its_children() {
        let mut engine = compact(Tree::groups(2, 3));
        assert_eq!(engine.total_slot_count(), 8);
        assert_eq!(engine.visible_line_count(), 8);

        assert!(engine.collapse(&0));
        assert_eq!(engine.visible_line_count(), 5);
        assert_eq!(engine.visible_slot(4), 1);
        assert_eq!(engine.slot_at_visible_line(1), Some(4));
        assert_eq!(engine.collapsed_slots_count(0, 7), 3);
        assert!(engine.is_slot_collapsed(2));
        assert!(engine.is_collapsed(&0));
        // Collapsed rows keep their slot but render at zero length.
        assert_eq!(engine.total_slot_count(), 8);
        assert_eq!(engine.total_length(), 5.0);

        let header = engine.item_at_slot(0).unwrap();
        assert!(header.is_collapsed());
        assert!(header.flags.contains(ItemFlags::COLLAPSIBLE));
        let hidden = engine.item_at_slot(1).unwrap();
        assert!(!hidden.flags.contains(ItemFlags::DISPLAYED));
    }

    #[test]
    fn collapse_then_expand_restores_state() {
        let mut engine = compact(Tree::groups(3, 2));
        let events = record(&mut engine);

        assert!(engine.collapse(&3));
        assert!(!engine.collapse(&3), "already collapsed");
        assert!(engine.expand(&3));
        assert!(!engine.expand(&3), "already expanded");

        assert_eq!(engine.visible_line_count(), 9);
        assert_eq!(engine.collapsed_slots_count(0, 8), 0);
        assert_eq!(
            *events.borrow(),
            [
                LayoutEvent::Collapsed {
                    item: 3,
                    start_slot: 4,
                    count: 2
                },
                LayoutEvent::Expanded {
                    item: 3,
                    start_slot: 4,
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn only_visible_groups_with_children_collapse() {
        let mut engine = compact(nested());
        assert!(!engine.collapse(&2), "leaves are not groups");
        assert!(!engine.collapse(&42), "unknown item");
        assert!(engine.collapse(&0));
        assert!(!engine.collapse(&1), "hidden by its parent");
        assert!(!engine.is_group_visible(&1));
        assert!(engine.is_group_visible(&0));
    }

    #[test]
    fn nested_collapse_survives_parent_toggle() {
        let mut engine = compact(nested());
        let events = record(&mut engine);
        assert_eq!(engine.total_slot_count(), 8);

        assert!(engine.collapse(&1));
        assert_eq!(engine.visible_line_count(), 6);
        assert!(engine.collapse(&0));
        assert_eq!(engine.visible_line_count(), 3);
        assert!(engine.expand(&0));
        assert_eq!(engine.visible_line_count(), 6);
        assert!(engine.is_collapsed(&1));
        assert!(engine.is_slot_collapsed(2));
        assert!(!engine.is_slot_collapsed(4));

        let counts: Vec<usize> = events
            .borrow()
            .iter()
            .map(|event| match event {
                LayoutEvent::Collapsed { count, .. } | LayoutEvent::Expanded { count, .. } => {
                    *count
                }
                LayoutEvent::ItemsSourceChanged => 0,
            })
            .collect();
        assert_eq!(counts, [2, 3, 3]);

        assert!(engine.expand(&1));
        assert_eq!(engine.visible_line_count(), 8);
    }

    #[test]
    fn expanding_below_a_collapsed_parent_waits_for_it() {
        let mut engine = compact(nested());
        assert!(engine.collapse(&1));
        assert!(engine.collapse(&0));
        assert!(engine.expand(&1));
        assert_eq!(engine.visible_line_count(), 3);
        assert!(engine.expand(&0));
        assert_eq!(engine.visible_line_count(), 8);
    }

    #[test]
    fn groups_know_their_spans_and_parents() {
        let engine = compact(nested());
        assert_eq!(engine.group_count(), 4);
        let spans: Vec<_> = engine
            .groups()
            .map(|node| (*node.item(), node.index(), node.span(), node.level()))
            .collect();
        assert_eq!(spans, [(0, 0, 6, 0), (1, 1, 3, 1), (4, 4, 2, 1), (6, 6, 2, 0)]);
        assert_eq!(engine.parent_of(&4), Some(&0));
        assert_eq!(engine.parent_of(&0), None);
        assert_eq!(engine.parent_of(&2), None);

        let leaf = engine.item_at_slot(3).unwrap();
        assert_eq!((leaf.item, leaf.level), (Some(3), 2));
        assert_eq!(engine.item_at_slot(8), None);
    }

    #[test]
    fn group_levels_limit_indexing() {
        let engine = LayoutEngine::new(nested(), LayoutConfig::new(), SourceOptions::grouped(1))
            .unwrap();
        // Subgroups are leaves at the bottom level.
        assert_eq!(engine.total_slot_count(), 5);
        assert_eq!(engine.group_count(), 2);
        let flat = LayoutEngine::new(nested(), LayoutConfig::new(), SourceOptions::flat()).unwrap();
        assert_eq!(flat.total_slot_count(), 2);
        assert_eq!(flat.group_count(), 0);
    }

    #[test]
    fn reload_restores_collapse_by_identity() {
        let mut engine = compact(nested());
        let events = record(&mut engine);
        assert!(engine.collapse(&1));
        assert!(engine.collapse(&6));

        engine.reload(SourceOptions::default().restoring_collapsed(true));
        assert!(engine.is_collapsed(&1));
        assert!(engine.is_collapsed(&6));
        assert_eq!(engine.visible_line_count(), 5);
        assert_eq!(events.borrow().last(), Some(&LayoutEvent::ItemsSourceChanged));

        engine.reload(SourceOptions::default());
        assert!(!engine.is_collapsed(&1));
        assert_eq!(engine.visible_line_count(), 8);
    }

    #[test]
    fn set_source_restores_collapse_of_surviving_items() {
        let mut engine = compact(Tree::groups(2, 2));
        assert!(engine.collapse(&0));
        let previous = engine.set_source(
            Tree::groups(1, 4),
            SourceOptions::default().restoring_collapsed(true),
        );
        assert_eq!(previous.child_count(None), 2);
        // Item 0 still exists and is still a group.
        assert!(engine.is_collapsed(&0));
        assert_eq!(engine.visible_line_count(), 1);
    }

    #[test]
    fn physical_offsets_follow_measurements() {
        let mut engine = LayoutEngine::new(
            (0..4).collect::<Vec<u32>>(),
            LayoutConfig::new().with_default_item_length(10.0),
            SourceOptions::flat(),
        )
        .unwrap();
        assert_eq!(engine.total_length(), 40.0);
        engine.update_slot_length(1, 30.0);
        assert_eq!(engine.total_length(), 60.0);
        assert_eq!(engine.physical_offset_from_slot(1), 40.0);
        assert_eq!(engine.physical_length_for_slot(1), Some(30.0));
        assert_eq!(engine.physical_length_for_slot(4), None);
        assert_eq!(engine.slot_from_physical_offset(45.0, true), 2.5);
        assert_eq!(engine.slot_from_physical_offset(5.0, true), 0.5);

        engine.update_average_length(0, 1);
        assert_eq!(engine.average_item_length(), 20.0);

        engine.set_default_item_length(20.0).unwrap();
        assert_eq!(engine.total_length(), 90.0);
        assert!(engine.set_default_item_length(-1.0).is_err());
    }

    #[test]
    fn physical_offsets_skip_collapsed_rows() {
        let mut engine = compact(Tree::groups(2, 2));
        assert!(engine.collapse(&0));
        // Rows 1 and 2 are hidden; row 3 starts right after row 0.
        assert_eq!(engine.physical_offset_from_slot(3), 2.0);
        assert_eq!(engine.slot_from_physical_offset(1.5, true), 3.5);
        assert_eq!(engine.slot_from_physical_offset(1.5, false), 1.5);

        let window = engine.visible_window(0.0, 2.0, 0.0, 0.0);
        assert_eq!((window.start, window.end), (0, 4));
        assert_eq!(window.content_extent, 4.0);
    }

    #[test]
    fn average_length_ignores_collapsed_rows() {
        let mut engine = compact(Tree::groups(2, 2));
        for slot in 0..6 {
            engine.update_slot_length(slot, 4.0);
        }
        assert!(engine.collapse(&0));
        engine.update_average_length(0, 5);
        assert_eq!(engine.average_item_length(), 4.0);

        // Nothing realized, nothing learned.
        engine.update_slot_length(1, 10.0);
        engine.update_average_length(1, 2);
        assert_eq!(engine.average_item_length(), 4.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LayoutConfig::new().with_default_item_length(f64::INFINITY);
        let err = LayoutEngine::new(Vec::<u32>::new(), config, SourceOptions::flat()).unwrap_err();
        assert_eq!(err, LayoutError::InvalidConfig("default item length"));
    }

    #[test]
    fn empty_source_has_no_lines() {
        let engine = compact(Vec::<u32>::new());
        assert_eq!(engine.total_slot_count(), 0);
        assert_eq!(engine.total_length(), 0.0);
        assert_eq!(engine.slot_from_physical_offset(10.0, true), 0.0);
        assert_eq!(engine.lines(0, true).count(), 0);
        assert!(engine.visible_window(0.0, 100.0, 0.0, 0.0).is_empty());
    }

    #[test]
    fn loading_indicator_appends_a_row() {
        let mut engine = compact(Tree::groups(1, 2));
        engine.add_strategy(Box::new(LoadingIndicatorStrategy::new(true)));
        assert_eq!(engine.total_slot_count(), 4);
        assert_eq!(engine.flat_slot_count(), 4);
        assert_eq!(engine.flat_row_count(), 3);

        let last = engine.lines(3, true).next().unwrap();
        assert_eq!(last[0].item, None);
        assert_eq!(last[0].kind, RowKind::LoadingIndicator);
        assert_eq!(last[0].id, 3);

        // Collapsing keeps the indicator visible.
        assert!(engine.collapse(&0));
        assert_eq!(engine.visible_line_count(), 2);
        assert_eq!(engine.lines(1, true).next().unwrap()[0].kind, RowKind::LoadingIndicator);

        let names: Vec<_> = engine.strategies().map(|s| s.name()).collect();
        assert_eq!(names, ["items", "loading_indicator"]);
        assert_eq!(engine.remove_strategies_where(|s| s.name() == "loading_indicator"), 1);
        assert_eq!(engine.total_slot_count(), 3);
        assert!(engine.is_collapsed(&0), "strategy changes keep collapse state");
    }

    #[test]
    fn summary_rows_are_flagged() {
        #[derive(Debug)]
        struct WithTotals;

        impl HierarchyAdapter for WithTotals {
            type Item = u32;

            fn child_count(&self, parent: Option<&u32>) -> usize {
                match parent {
                    None => 2,
                    Some(0) => 2,
                    Some(_) => 0,
                }
            }

            fn child_at(&self, parent: Option<&u32>, index: usize) -> Option<u32> {
                match parent {
                    None => [0, 9].get(index).copied(),
                    Some(0) => [1, 2].get(index).copied(),
                    Some(_) => None,
                }
            }

            fn row_kind(&self, item: &u32) -> RowKind {
                match item {
                    0 => RowKind::Header,
                    2 => RowKind::Subtotal,
                    9 => RowKind::GrandTotal,
                    _ => RowKind::BottomLevel,
                }
            }
        }

        let options = SourceOptions {
            show_aggregate_values_inline: true,
            ..SourceOptions::default()
        };
        let mut engine = LayoutEngine::new(WithTotals, LayoutConfig::new(), options).unwrap();
        let flags = |engine: &LayoutEngine<WithTotals>, flat| {
            engine.item_at_slot(flat).unwrap().flags.contains(ItemFlags::SUMMARY_VISIBLE)
        };
        assert!(!flags(&engine, 0));
        assert!(flags(&engine, 2));
        assert!(flags(&engine, 3));
        assert!(engine.collapse(&0));
        assert!(flags(&engine, 0), "collapsed headers show aggregates inline");
    }
}
