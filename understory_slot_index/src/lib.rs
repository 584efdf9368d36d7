// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Slot Index: sparse interval tables and cumulative offset indexes.
//!
//! This crate provides the two leaf data structures behind a virtualized,
//! grouped list: a dense strip of *slots* indexed `0..len`, where most slots
//! carry no interesting state and only a few ranges (collapsed groups, group
//! headers) need bookkeeping.
//!
//! The core concepts are:
//!
//! - [`IntervalValueIndex`]: an ordered, run-compressed mapping from slot
//!   indices to values. Inserting or removing slots shifts every later run, so
//!   the table stays aligned with a list that grows and shrinks in the middle.
//!   Queries cost `O(log runs)`, not `O(slots)`, which keeps a list with millions
//!   of rows and a handful of collapsed ranges cheap.
//! - [`OffsetIndex`]: per-slot physical lengths with cumulative offset queries
//!   in both directions. Slots start out *unknown* and resolve to a configured
//!   default length until measured, so scrolling works before every row has
//!   been laid out.
//! - [`ExtentModel`] and [`compute_visible_strip`]: a small 1D windowing helper
//!   that, given a scroll offset, viewport extent, and overscan, returns which
//!   slots should be realized plus how much padding lies before and after them.
//!
//! This crate does not know about items, groups, or widgets. Higher layers own
//! that meaning and keep these tables in sync with it.
//!
//! ## Minimal example
//!
//! ```rust
//! use understory_slot_index::{IntervalValueIndex, OffsetIndex};
//!
//! // Ten rows, the middle three collapsed.
//! let mut collapsed = IntervalValueIndex::new();
//! collapsed.add_values(4, 3, true);
//! assert_eq!(collapsed.index_count(0, 9), 3);
//! assert_eq!(collapsed.next_gap(3), 7);
//!
//! // A row is inserted before the collapsed range; the range moves with it.
//! collapsed.insert_indexes(2, 1);
//! assert!(collapsed.contains(5) && !collapsed.contains(4));
//!
//! // Physical lengths: unmeasured rows fall back to the default.
//! let mut offsets = OffsetIndex::with_len(4, 20.0);
//! offsets.update(1, 50.0);
//! assert_eq!(offsets.offset_from_index(1), 70.0);
//! assert_eq!(offsets.index_from_offset(60.0), 1);
//! assert_eq!(offsets.total_length(), 110.0);
//! ```
//!
//! All lengths and offsets live in a caller-chosen 1D coordinate space
//! (typically logical pixels) and are expected to be finite and non-negative.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod extent;
mod interval;
mod offset;

pub use extent::{ExtentModel, VisibleStrip, compute_visible_strip};
pub use interval::IntervalValueIndex;
pub use offset::OffsetIndex;
