// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small mutable hierarchy for unit tests.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::HierarchyAdapter;

/// Items are `u32` ids; `children[&None]` lists the root's children.
#[derive(Clone, Debug, Default)]
pub(crate) struct Tree {
    children: BTreeMap<Option<u32>, Vec<u32>>,
    next: u32,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `groups` root groups of `leaves` leaves each, ids assigned in slot
    /// order so that every id equals its flat slot.
    pub(crate) fn groups(groups: usize, leaves: usize) -> Self {
        let mut tree = Self::new();
        for _ in 0..groups {
            let group = tree.push(None);
            for _ in 0..leaves {
                tree.push(Some(group));
            }
        }
        tree
    }

    /// Appends a fresh item under `parent` and returns its id.
    pub(crate) fn push(&mut self, parent: Option<u32>) -> u32 {
        let id = self.fresh();
        self.children.entry(parent).or_default().push(id);
        id
    }

    /// Allocates an id without placing it in the tree.
    pub(crate) fn fresh(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub(crate) fn insert(&mut self, parent: Option<u32>, index: usize, id: u32) {
        self.children.entry(parent).or_default().insert(index, id);
    }

    pub(crate) fn remove(&mut self, parent: Option<u32>, index: usize) -> u32 {
        self.children
            .get_mut(&parent)
            .map(|children| children.remove(index))
            .unwrap()
    }
}

impl HierarchyAdapter for Tree {
    type Item = u32;

    fn child_count(&self, parent: Option<&u32>) -> usize {
        self.children.get(&parent.copied()).map_or(0, Vec::len)
    }

    fn child_at(&self, parent: Option<&u32>, index: usize) -> Option<u32> {
        self.children.get(&parent.copied())?.get(index).copied()
    }
}
