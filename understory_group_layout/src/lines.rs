// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy row iteration over visible lines.

use core::fmt;
use core::iter::FusedIterator;

use crate::{HierarchyAdapter, LayoutEngine, Row};

/// Iterator over visible rows, returned by [`LayoutEngine::lines`].
///
/// Each step asks the engine's strategies, in order, to describe the current
/// row and yields the first non-empty answer. Iteration ends at either end of
/// the layout, or at the first row no strategy claims.
pub struct Lines<'a, A: HierarchyAdapter> {
    engine: &'a LayoutEngine<A>,
    line: usize,
    slot: Option<usize>,
    forward: bool,
}

impl<A: HierarchyAdapter> fmt::Debug for Lines<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lines")
            .field("line", &self.line)
            .field("slot", &self.slot)
            .field("forward", &self.forward)
            .finish_non_exhaustive()
    }
}

impl<'a, A: HierarchyAdapter> Lines<'a, A> {
    pub(crate) fn new(
        engine: &'a LayoutEngine<A>,
        line: usize,
        slot: Option<usize>,
        forward: bool,
    ) -> Self {
        Self {
            engine,
            line,
            slot,
            forward,
        }
    }

    /// The visible line the next row will be rendered at.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<A: HierarchyAdapter> Iterator for Lines<'_, A> {
    type Item = Row<A::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slot?;
        let row = self
            .engine
            .strategies
            .iter()
            .map(|strategy| strategy.build_item_infos(self.engine, self.line, slot))
            .find(|row| !row.is_empty());
        let Some(row) = row else {
            self.slot = None;
            return None;
        };
        if self.forward {
            self.slot = self.engine.next_visible_slot(slot);
            self.line += 1;
        } else {
            self.slot = self.engine.previous_visible_slot(slot);
            self.line = self.line.saturating_sub(1);
        }
        Some(row)
    }
}

impl<A: HierarchyAdapter> FusedIterator for Lines<'_, A> {}
