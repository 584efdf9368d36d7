// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Group Layout: a virtualized layout engine for grouped,
//! collapsible item hierarchies.
//!
//! The engine maps a possibly very large hierarchy of items (group headers,
//! nested groups, leaves) onto a linear strip of *slots* and keeps three
//! things cheap to answer while the hierarchy changes:
//!
//! - which row renders at a given visible line, with collapsed groups
//!   skipped;
//! - how a physical scroll offset maps to a row and back, from measured row
//!   lengths where known and a default length elsewhere;
//! - which rows an insertion or removal touched, so a presentation layer can
//!   patch its realized children instead of laying everything out again.
//!
//! The core concepts are:
//!
//! - [`HierarchyAdapter`]: read access to the caller's items. The engine
//!   never owns or mutates them.
//! - [`LayoutEngine`]: the tables and every query and mutation. Groups are
//!   [`GroupNode`]s in an arena, addressed by [`NodeId`].
//! - [`LayoutShape`]: one item per row (`Compact`), a fixed number of leaves
//!   per row (`Stacked`), or leaves flowing into rows by their opposite-axis
//!   length (`Wrap`). Headers always take a row of their own.
//! - [`LayoutStrategy`]: contributors of rows. [`ItemsStrategy`] lays out the
//!   source; [`LoadingIndicatorStrategy`] appends a row while more data is on
//!   its way.
//! - [`LayoutEvent`]: synchronous notifications for collapse, expand, and
//!   re-index.
//!
//! Two coordinates matter. A *flat slot* is a position in the depth-first
//! order of every displayed item, headers included. A *row slot* is a visual
//! row; several flat slots share one in stacked and wrapped layouts.
//! Collapse state and physical lengths are kept per row slot.
//!
//! ## Minimal example
//!
//! ```rust
//! use understory_group_layout::{
//!     HierarchyAdapter, LayoutConfig, LayoutEngine, LayoutEvent, SourceOptions,
//! };
//!
//! /// Two groups of three items each.
//! struct Groups;
//!
//! impl HierarchyAdapter for Groups {
//!     type Item = &'static str;
//!
//!     fn child_count(&self, parent: Option<&&'static str>) -> usize {
//!         match parent {
//!             None => 2,
//!             Some(&"fruit" | &"veg") => 3,
//!             Some(_) => 0,
//!         }
//!     }
//!
//!     fn child_at(&self, parent: Option<&&'static str>, index: usize) -> Option<&'static str> {
//!         let children: &[&'static str] = match parent {
//!             None => &["fruit", "veg"],
//!             Some(&"fruit") => &["apple", "pear", "plum"],
//!             Some(&"veg") => &["kale", "leek", "okra"],
//!             Some(_) => &[],
//!         };
//!         children.get(index).copied()
//!     }
//! }
//!
//! let mut engine =
//!     LayoutEngine::new(Groups, LayoutConfig::new(), SourceOptions::default()).unwrap();
//! assert_eq!(engine.total_slot_count(), 8);
//!
//! engine.connect(|event| {
//!     if let LayoutEvent::Collapsed { item, count, .. } = event {
//!         assert_eq!((*item, *count), ("fruit", 3));
//!     }
//! });
//! assert!(engine.collapse(&"fruit"));
//! assert_eq!(engine.visible_line_count(), 5);
//! // The "veg" header moves up to the second visible line.
//! assert_eq!(engine.visible_slot(4), 1);
//!
//! let headers: Vec<_> = engine
//!     .lines(0, true)
//!     .filter_map(|row| row[0].item)
//!     .collect();
//! assert_eq!(headers, ["fruit", "veg", "kale", "leek", "okra"]);
//! ```
//!
//! Queries outside the current range never fail: they return `None`, an
//! empty iterator, or a clamped value. Mutations that disagree with the
//! engine's tables return a [`LayoutError`] and log a warning through
//! `tracing`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod adapter;
mod config;
mod engine;
mod error;
mod event;
mod info;
mod lines;
mod node;
mod shape;
mod strategy;
mod update;

#[cfg(test)]
mod testing;

pub use adapter::{HierarchyAdapter, RowKind};
pub use config::{LayoutConfig, LayoutShape, SourceOptions, TotalsPosition};
pub use engine::{LayoutEngine, SubtreeCount};
pub use error::LayoutError;
pub use event::{LayoutEvent, ListenerId};
pub use info::{AddRemoveResult, ItemFlags, ItemInfo, Row};
pub use lines::Lines;
pub use node::{GroupNode, NodeId};
pub use strategy::{ItemsStrategy, LayoutStrategy, LoadingIndicatorStrategy};
