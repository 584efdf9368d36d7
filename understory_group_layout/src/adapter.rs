// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The hierarchy an engine lays out, as seen through its data source.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

/// What kind of row an item renders as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum RowKind {
    /// An ordinary data item.
    #[default]
    BottomLevel,
    /// A group header.
    Header,
    /// A per-group summary row.
    Subtotal,
    /// A summary row over the whole source.
    GrandTotal,
    /// A synthetic row announcing that more items are being fetched.
    LoadingIndicator,
}

/// Read access to a grouped item hierarchy.
///
/// The engine never owns or mutates items; it only walks the hierarchy through
/// this trait. `parent == None` addresses the root of the source.
///
/// Answers must stay stable for the duration of a single engine call. When
/// the underlying data changes, mutate it first and then report the change
/// through [`LayoutEngine::add_item`](crate::LayoutEngine::add_item) or
/// [`LayoutEngine::remove_item`](crate::LayoutEngine::remove_item).
pub trait HierarchyAdapter {
    /// Item handle. Equality is item identity: it is how collapse state is
    /// matched across source resets.
    type Item: Clone + Eq + Hash + Debug;

    /// Number of children of `parent`.
    fn child_count(&self, parent: Option<&Self::Item>) -> usize;

    /// The child of `parent` at `index`.
    fn child_at(&self, parent: Option<&Self::Item>, index: usize) -> Option<Self::Item>;

    /// Iterates over the children of `parent`, in order.
    fn children<'a>(
        &'a self,
        parent: Option<&'a Self::Item>,
    ) -> impl Iterator<Item = Self::Item> + 'a {
        (0..self.child_count(parent)).filter_map(move |i| self.child_at(parent, i))
    }

    /// The row kind `item` renders as.
    ///
    /// By default items with children are headers and everything else is a
    /// bottom-level row. Sources with aggregate rows override this.
    fn row_kind(&self, item: &Self::Item) -> RowKind {
        if self.child_count(Some(item)) > 0 {
            RowKind::Header
        } else {
            RowKind::BottomLevel
        }
    }
}

/// A flat source: the vector's elements are the root's children.
impl<T: Clone + Eq + Hash + Debug> HierarchyAdapter for Vec<T> {
    type Item = T;

    fn child_count(&self, parent: Option<&T>) -> usize {
        if parent.is_none() { self.len() } else { 0 }
    }

    fn child_at(&self, parent: Option<&T>, index: usize) -> Option<T> {
        if parent.is_none() {
            self.get(index).cloned()
        } else {
            None
        }
    }
}
