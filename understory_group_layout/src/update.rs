// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental updates: one item (or subtree) added to or removed from a
//! container without a full re-index.

use alloc::vec::Vec;

use crate::engine::TARGET;
use crate::{AddRemoveResult, GroupNode, HierarchyAdapter, LayoutEngine, LayoutError, NodeId};

impl<A: HierarchyAdapter> LayoutEngine<A> {
    /// Reports that `added` was inserted as child `index` of `changed`
    /// (`None` for the root). The adapter must already reflect the change.
    ///
    /// A group is counted with its whole subtree. Returns the rows that were
    /// inserted; a stacked or wrapped row can absorb a leaf, in which case
    /// the count is zero.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownGroup`] if `changed` is neither indexed nor a
    /// displayed child of an indexed group, and
    /// [`LayoutError::InconsistentTables`] if a flat source carries headers.
    pub fn add_item(
        &mut self,
        changed: Option<&A::Item>,
        added: &A::Item,
        index: usize,
    ) -> Result<AddRemoveResult, LayoutError> {
        if changed.is_none() && self.options.group_levels == 0 && !self.headers.is_empty() {
            return Err(self.inconsistent("a flat source has group headers"));
        }
        let container = self.resolve_container(changed, index)?;
        let container_node = container.and_then(|id| self.nodes.get(id));
        let level = container_node.map_or(0, |node| node.level + 1);
        let container_shown = container.is_none_or(|id| {
            self.nodes.get(id).is_some_and(|node| node.is_expanded) && self.is_node_visible(id)
        });
        let slot = self.child_slot(container, index);
        let end = container_node.map_or(self.item_slot_count, |node| node.last_sub_item_slot + 1);
        if slot > end {
            tracing::warn!(target: TARGET, index, "added item is past the end of its container");
            return Err(LayoutError::ItemNotFound { index });
        }

        let mut created = Vec::new();
        let counted = self.count_and_populate_tables(
            added,
            slot,
            level,
            self.options.group_levels,
            container,
            false,
            Some(&mut created),
        );
        let count = counted.slots;
        self.shift_headers_for_insert(slot, count, container);
        for id in created {
            self.register(id);
        }

        let container_node = container.and_then(|id| self.nodes.get(id));
        let (start_row, rows) = if self.is_wrap() {
            let old = self.item_row_count;
            self.wrap.insert_items(slot, count);
            self.reflow();
            self.item_row_count = self.wrap.row_count();
            (
                self.row_of_flat_slot(slot),
                self.item_row_count.saturating_sub(old),
            )
        } else if self.stacks_children(container_node) {
            let after = self.stacked_leaf_count(container);
            let k = self.stack_count();
            let rows = after.div_ceil(k) - (after - count).div_ceil(k);
            self.item_row_count += rows;
            (self.row_of_flat_slot(slot), rows)
        } else {
            self.item_row_count += counted.rows;
            (self.row_of_flat_slot(slot), counted.rows)
        };

        self.total_slot_count += rows;
        self.offsets.insert_range(start_row, None, rows);
        if self.is_wrap() {
            self.rebuild_collapsed_rows();
        } else if container_shown {
            self.collapsed.insert_indexes(start_row, rows);
            self.visible_line_count += rows;
        } else {
            self.collapsed.insert_indexes_and_values(start_row, rows, true);
            self.offsets.set_hidden(start_row, rows, true);
        }

        let result = AddRemoveResult::new(start_row, rows);
        self.notify_added(result);
        tracing::trace!(
            target: TARGET,
            item = ?added,
            flat = slot,
            flat_count = count,
            start_slot = start_row,
            rows,
            "added item"
        );
        Ok(result)
    }

    /// Reports that `removed` was removed from child `index` of `changed`
    /// (`None` for the root). The adapter must already reflect the change.
    ///
    /// Returns the rows that were removed.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownGroup`] if `changed` is not an indexed group,
    /// and [`LayoutError::ItemNotFound`] if `index` is past the container's
    /// last child.
    pub fn remove_item(
        &mut self,
        changed: Option<&A::Item>,
        removed: &A::Item,
        index: usize,
    ) -> Result<AddRemoveResult, LayoutError> {
        let container = match changed {
            None => None,
            Some(item) => match self.registry.get(item) {
                Some(&id) => Some(id),
                None => {
                    tracing::warn!(target: TARGET, ?item, "removal from an unindexed container");
                    return Err(LayoutError::UnknownGroup);
                }
            },
        };
        let (slot, count) = match self.registry.get(removed).copied().filter(|&id| {
            self.nodes
                .get(id)
                .is_some_and(|node| node.parent == container)
        }) {
            Some(id) => self
                .nodes
                .get(id)
                .map_or((0, 0), |node| (node.index, node.span())),
            None => {
                let slot = self.child_slot(container, index);
                let end = container
                    .and_then(|id| self.nodes.get(id))
                    .map_or(self.item_slot_count, |node| node.last_sub_item_slot + 1);
                if slot >= end {
                    tracing::warn!(target: TARGET, index, "removed item has no slot");
                    return Err(LayoutError::ItemNotFound { index });
                }
                let span = self
                    .headers
                    .get(slot)
                    .and_then(|&id| self.nodes.get(id))
                    .map_or(1, GroupNode::span);
                (slot, span)
            }
        };
        if count == 0 {
            return Err(self.inconsistent("a removed group has no span"));
        }

        let container_node = container.and_then(|id| self.nodes.get(id));
        let start_row = self.row_of_flat_slot(slot);
        let stacked = self.stacks_children(container_node);
        let stacked_rows = if stacked {
            let before = self.stacked_leaf_count(container);
            let k = self.stack_count();
            before.div_ceil(k) - (before - count).div_ceil(k)
        } else {
            0
        };
        let spanned_rows = self.row_of_flat_slot(slot + count - 1) - start_row + 1;

        self.shift_headers_for_remove(slot, count, container);

        let rows = if self.is_wrap() {
            let old = self.item_row_count;
            self.wrap.remove_items(slot, count);
            self.reflow();
            self.item_row_count = self.wrap.row_count();
            old.saturating_sub(self.item_row_count)
        } else if stacked {
            stacked_rows
        } else {
            spanned_rows
        };
        if !self.is_wrap() {
            self.item_row_count -= rows;
        }

        self.total_slot_count -= rows;
        if self.is_wrap() {
            self.offsets.remove_range(start_row, rows);
            self.rebuild_collapsed_rows();
        } else {
            let hidden = self.hidden_rows(start_row, rows);
            self.collapsed.remove_indexes_and_values(start_row, rows);
            self.offsets.remove_range(start_row, rows);
            self.visible_line_count -= rows - hidden;
        }

        let result = AddRemoveResult::new(start_row, rows);
        self.notify_removed(result);
        tracing::trace!(
            target: TARGET,
            item = ?removed,
            flat = slot,
            flat_count = count,
            start_slot = start_row,
            rows,
            "removed item"
        );
        Ok(result)
    }

    /// The node of `changed`, registering it on the spot if it is a group
    /// that was empty (and so unindexed) until now.
    ///
    /// Such a group can only gain child `0`; any other `index` is rejected
    /// before the group is registered.
    fn resolve_container(
        &mut self,
        changed: Option<&A::Item>,
        index: usize,
    ) -> Result<Option<NodeId>, LayoutError> {
        let Some(item) = changed else {
            return Ok(None);
        };
        if let Some(&id) = self.registry.get(item) {
            return Ok(Some(id));
        }
        let node = self.find_unindexed_group(item)?;
        if index > 0 {
            tracing::warn!(target: TARGET, index, "added item is past the end of an empty group");
            return Err(LayoutError::ItemNotFound { index });
        }
        let slot = node.index;
        let id = self.nodes.insert(node);
        self.register(id);
        tracing::trace!(target: TARGET, ?item, slot, "indexed group on its first child");
        Ok(Some(id))
    }

    /// Finds `item` among the children of the root and of every indexed
    /// group whose children are laid out, and builds its node with a span of
    /// one. Nothing is registered.
    fn find_unindexed_group(&self, item: &A::Item) -> Result<GroupNode<A::Item>, LayoutError> {
        let levels = self.options.group_levels;
        let mut candidates: Vec<Option<NodeId>> = Vec::new();
        if levels > 0 {
            candidates.push(None);
        }
        candidates.extend(self.headers.runs().filter_map(|(_, _, &id)| {
            let node = self.nodes.get(id)?;
            (node.level + 1 < levels).then_some(Some(id))
        }));

        for owner in candidates {
            let owner_node = owner.and_then(|id| self.nodes.get(id));
            let Some(ordinal) = self
                .adapter
                .children(owner_node.map(|node| &node.item))
                .position(|child| child == *item)
            else {
                continue;
            };
            let level = owner_node.map_or(0, |node| node.level + 1);
            let slot = self.child_slot(owner, ordinal);
            if self.headers.contains(slot) {
                break;
            }
            return Ok(GroupNode::new(item.clone(), owner, level, slot));
        }
        tracing::warn!(target: TARGET, ?item, "changed container is not part of the layout");
        Err(LayoutError::UnknownGroup)
    }

    /// Opens `count` flat slots at `slot` inside `container`.
    fn shift_headers_for_insert(&mut self, slot: usize, count: usize, container: Option<NodeId>) {
        self.headers.insert_indexes(slot, count);
        for (header, _, &id) in self.headers.runs_from(slot + count) {
            if let Some(node) = self.nodes.get_mut(id) {
                node.index = header;
                node.last_sub_item_slot += count;
            }
        }
        self.grow_ancestors(container, count);
        self.item_slot_count += count;
        self.flat_slot_count += count;
    }

    /// Drops flat `slot..slot + count` from `container`, forgetting every
    /// group that lived there.
    fn shift_headers_for_remove(&mut self, slot: usize, count: usize, container: Option<NodeId>) {
        let doomed: Vec<NodeId> = self
            .headers
            .runs_from(slot)
            .take_while(|&(header, _, _)| header < slot + count)
            .map(|(_, _, &id)| id)
            .collect();
        for id in doomed {
            if let Some(node) = self.nodes.remove(id) {
                self.registry.remove(&node.item);
            }
        }
        self.headers.remove_indexes_and_values(slot, count);
        for (header, _, &id) in self.headers.runs_from(slot) {
            if let Some(node) = self.nodes.get_mut(id) {
                node.index = header;
                node.last_sub_item_slot -= count;
            }
        }
        let mut current = container;
        while let Some(id) = current {
            let Some(node) = self.nodes.get_mut(id) else {
                break;
            };
            node.last_sub_item_slot -= count;
            current = node.parent;
        }
        self.item_slot_count -= count;
        self.flat_slot_count -= count;
    }

    fn grow_ancestors(&mut self, container: Option<NodeId>, count: usize) {
        let mut current = container;
        while let Some(id) = current {
            let Some(node) = self.nodes.get_mut(id) else {
                break;
            };
            node.last_sub_item_slot += count;
            current = node.parent;
        }
    }

    fn hidden_rows(&self, start: usize, count: usize) -> usize {
        match count {
            0 => 0,
            _ => self.collapsed.index_count(start, start + count - 1),
        }
    }

    fn inconsistent(&self, what: &'static str) -> LayoutError {
        tracing::warn!(target: TARGET, what, "layout tables are inconsistent");
        LayoutError::InconsistentTables(what)
    }
}
