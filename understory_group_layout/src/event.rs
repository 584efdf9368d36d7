// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronous change notifications.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// A change published by the engine, delivered inline during the call that
/// caused it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutEvent<T> {
    /// A group was collapsed, hiding `count` rows starting at `start_slot`.
    Collapsed {
        /// The group's item.
        item: T,
        /// First hidden row slot.
        start_slot: usize,
        /// Number of rows that became hidden.
        count: usize,
    },
    /// A group was expanded, revealing `count` rows starting at `start_slot`.
    Expanded {
        /// The group's item.
        item: T,
        /// First row slot below the header.
        start_slot: usize,
        /// Number of rows that became visible.
        count: usize,
    },
    /// The engine was re-indexed from scratch.
    ItemsSourceChanged,
}

/// Handle returned by [`LayoutEngine::connect`](crate::LayoutEngine::connect).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Box<dyn FnMut(&LayoutEvent<T>)>;

/// Registered listeners, invoked in connection order.
pub(crate) struct Listeners<T> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<T> Listeners<T> {
    pub(crate) fn connect(&mut self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn disconnect(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn emit(&mut self, event: &LayoutEvent<T>) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}
