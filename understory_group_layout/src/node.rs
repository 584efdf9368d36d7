// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Group nodes and the arena that owns them.

use alloc::vec::Vec;

/// Identifier for a group node (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(u32, u32);

impl NodeId {
    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// One indexed group header and the flat-slot span of its subtree.
///
/// Nodes live in an arena owned by the engine. The parent link is an arena
/// id, never an owning pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupNode<T> {
    pub(crate) item: T,
    pub(crate) parent: Option<NodeId>,
    pub(crate) level: usize,
    pub(crate) index: usize,
    pub(crate) last_sub_item_slot: usize,
    pub(crate) is_expanded: bool,
}

impl<T> GroupNode<T> {
    pub(crate) const fn new(item: T, parent: Option<NodeId>, level: usize, index: usize) -> Self {
        Self {
            item,
            parent,
            level,
            index,
            last_sub_item_slot: index,
            is_expanded: true,
        }
    }

    /// The group's underlying item.
    #[must_use]
    pub const fn item(&self) -> &T {
        &self.item
    }

    /// The enclosing group, or `None` at the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Nesting depth; root-level groups are at level 0.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Flat slot of the header itself.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Flat slot of the last slot in this group's subtree (inclusive).
    #[must_use]
    pub const fn last_sub_item_slot(&self) -> usize {
        self.last_sub_item_slot
    }

    /// Whether the group is expanded. This is the group's own state; an
    /// expanded group under a collapsed ancestor is still hidden.
    #[must_use]
    pub const fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    /// Number of flat slots in this group's subtree, header included.
    #[must_use]
    pub const fn span(&self) -> usize {
        self.last_sub_item_slot - self.index + 1
    }

    /// Returns `true` if `slot` lies in the subtree below the header.
    pub(crate) const fn owns_child_slot(&self, slot: usize) -> bool {
        self.index < slot && slot <= self.last_sub_item_slot
    }
}

/// Generational slot storage for [`GroupNode`]s.
#[derive(Clone, Debug)]
pub(crate) struct GroupArena<T> {
    slots: Vec<Option<GroupNode<T>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl<T> Default for GroupArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }
}

impl<T> GroupArena<T> {
    pub(crate) fn insert(&mut self, node: GroupNode<T>) -> NodeId {
        if let Some(idx) = self.free_list.pop() {
            self.generations[idx] = self.generations[idx].wrapping_add(1);
            self.slots[idx] = Some(node);
            return NodeId(idx_u32(idx), self.generations[idx]);
        }
        self.slots.push(Some(node));
        self.generations.push(0);
        NodeId(idx_u32(self.slots.len() - 1), 0)
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<GroupNode<T>> {
        if !self.is_alive(id) {
            return None;
        }
        self.free_list.push(id.idx());
        self.slots[id.idx()].take()
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&GroupNode<T>> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.idx()].as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut GroupNode<T>> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.idx()].as_mut()
    }

    pub(crate) fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.free_list.clear();
        self.free_list.extend((0..self.slots.len()).rev());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    fn is_alive(&self, id: NodeId) -> bool {
        self.generations.get(id.idx()) == Some(&id.1)
            && self.slots.get(id.idx()).is_some_and(Option::is_some)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "arenas beyond u32::MAX groups are not supported"
)]
const fn idx_u32(idx: usize) -> u32 {
    idx as u32
}
