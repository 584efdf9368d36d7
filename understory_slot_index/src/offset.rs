// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cumulative physical offsets over a strip of slots with measured or unknown lengths.

use alloc::vec::Vec;

use crate::ExtentModel;

const NIL: usize = usize::MAX;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    /// Measured length, or `None` while unknown.
    length: Option<f64>,
    /// Hidden slots contribute no length.
    hidden: bool,
}

#[derive(Clone, Debug)]
struct Node {
    left: usize,
    right: usize,
    priority: u32,
    size: usize,
    sum: f64,
    entry: Entry,
}

/// Per-slot physical lengths with cumulative offset queries in both directions.
///
/// Each slot `0..len` holds either a measured length or the *unknown* sentinel,
/// which reads as [`default_length`](Self::default_length) until the slot is
/// measured. Slots can also be hidden (for example rows inside a collapsed
/// group), in which case they contribute zero length without forgetting their
/// measurement.
///
/// Storage is an implicit treap ordered by slot position and augmented with
/// subtree sums, so single-slot updates, offset queries, and the inverse
/// offset search all cost `O(log n)`, and inserting or removing a range of `k`
/// slots costs `O(k + log n)`.
///
/// Lengths are expected to be finite. Negative lengths are clamped to `0.0`.
#[derive(Clone, Debug)]
pub struct OffsetIndex {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: usize,
    seed: u32,
    default_length: f64,
}

impl Default for OffsetIndex {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl OffsetIndex {
    /// Creates an empty index resolving unknown lengths to `default_length`.
    #[must_use]
    pub fn new(default_length: f64) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NIL,
            seed: 0x9E37_79B9,
            default_length: sanitize(default_length),
        }
    }

    /// Creates an index of `len` unknown slots.
    #[must_use]
    pub fn with_len(len: usize, default_length: f64) -> Self {
        let mut index = Self::new(default_length);
        index.insert_range(0, None, len);
        index
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    /// Returns `true` if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Length reported for slots that have not been measured.
    #[must_use]
    pub const fn default_length(&self) -> f64 {
        self.default_length
    }

    /// Changes the length reported for unmeasured slots.
    ///
    /// This revisits every slot, so it costs `O(n)`.
    pub fn set_default_length(&mut self, default_length: f64) {
        self.default_length = sanitize(default_length);
        let root = self.root;
        self.repull_subtree(root);
    }

    /// Removes every slot.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = NIL;
    }

    /// Length of slot `index`, ignoring whether it is hidden.
    ///
    /// Unmeasured slots report the default length. Returns `None` if `index` is
    /// out of range.
    #[must_use]
    pub fn value_for_index(&self, index: usize) -> Option<f64> {
        self.entry(index)
            .map(|e| e.length.unwrap_or(self.default_length))
    }

    /// Returns `true` if slot `index` has a measured length.
    #[must_use]
    pub fn is_measured(&self, index: usize) -> bool {
        self.entry(index).is_some_and(|e| e.length.is_some())
    }

    /// Returns `true` if slot `index` is hidden.
    #[must_use]
    pub fn is_hidden(&self, index: usize) -> bool {
        self.entry(index).is_some_and(|e| e.hidden)
    }

    /// Offset of the trailing edge of slot `index`: the sum of `0..=index`.
    ///
    /// Indices past the end clamp to the last slot; an empty index reports `0.0`.
    #[must_use]
    pub fn offset_from_index(&self, index: usize) -> f64 {
        let len = self.len();
        if len == 0 {
            return 0.0;
        }
        self.sum_before(index.min(len - 1) + 1)
    }

    /// Offset of the leading edge of slot `index`: the sum of `0..index`.
    ///
    /// `offset_before(0)` is always `0.0`.
    #[must_use]
    pub fn offset_before(&self, index: usize) -> f64 {
        self.sum_before(index.min(self.len()))
    }

    /// Total length of all slots.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.sum(self.root)
    }

    /// Finds the slot whose cumulative range `(start, end]` contains `offset`.
    ///
    /// This is the smallest index whose [`offset_from_index`](Self::offset_from_index)
    /// is at least `offset`, so `index_from_offset(offset_from_index(i)) == i`
    /// whenever slot `i` has a non-zero length. Offsets past the end clamp to the
    /// last slot.
    #[must_use]
    pub fn index_from_offset(&self, offset: f64) -> usize {
        self.search(offset, false)
    }

    /// Finds the slot whose range `[start, end)` contains `offset`.
    ///
    /// Unlike [`index_from_offset`](Self::index_from_offset), an offset that
    /// lands exactly on a boundary resolves to the slot that *starts* there.
    #[must_use]
    pub fn index_at_offset(&self, offset: f64) -> usize {
        self.search(offset, true)
    }

    /// Inserts `count` slots at `start` with the given length (`None` for unknown).
    ///
    /// `start` is clamped to the current length.
    pub fn insert_range(&mut self, start: usize, length: Option<f64>, count: usize) {
        if count == 0 {
            return;
        }
        let entry = Entry {
            length: length.map(sanitize),
            hidden: false,
        };
        let middle = self.build(count, entry);
        let start = start.min(self.len());
        let (left, right) = self.split(self.root, start);
        let left = self.merge(left, middle);
        self.root = self.merge(left, right);
    }

    /// Removes `count` slots starting at `start`, clipped to the current length.
    pub fn remove_range(&mut self, start: usize, count: usize) {
        if count == 0 || start >= self.len() {
            return;
        }
        let (left, rest) = self.split(self.root, start);
        let (middle, right) = self.split(rest, count);
        self.release(middle);
        self.root = self.merge(left, right);
    }

    /// Records the measured length of slot `index`.
    ///
    /// Out-of-range indices are ignored.
    pub fn update(&mut self, index: usize, length: f64) {
        debug_assert!(
            length.is_finite(),
            "OffsetIndex lengths must be finite; got {length:?}"
        );
        if index < self.len() {
            let length = sanitize(length);
            let root = self.root;
            self.modify(root, index, &mut |e| e.length = Some(length));
        }
    }

    /// Forgets the measured length of slot `index`.
    pub fn reset(&mut self, index: usize) {
        if index < self.len() {
            let root = self.root;
            self.modify(root, index, &mut |e| e.length = None);
        }
    }

    /// Hides or shows `count` slots starting at `start`, clipped to the current length.
    pub fn set_hidden(&mut self, start: usize, count: usize, hidden: bool) {
        if count == 0 || start >= self.len() {
            return;
        }
        if count == 1 {
            let root = self.root;
            self.modify(root, start, &mut |e| e.hidden = hidden);
            return;
        }
        let (left, rest) = self.split(self.root, start);
        let (middle, right) = self.split(rest, count);
        self.visit_mut(middle, &mut |e| e.hidden = hidden);
        self.repull_subtree(middle);
        let left = self.merge(left, middle);
        self.root = self.merge(left, right);
    }

    fn size(&self, node: usize) -> usize {
        if node == NIL { 0 } else { self.nodes[node].size }
    }

    fn sum(&self, node: usize) -> f64 {
        if node == NIL { 0.0 } else { self.nodes[node].sum }
    }

    fn effective(&self, entry: &Entry) -> f64 {
        if entry.hidden {
            0.0
        } else {
            entry.length.unwrap_or(self.default_length)
        }
    }

    fn pull(&mut self, node: usize) {
        let Node {
            left, right, entry, ..
        } = self.nodes[node];
        let size = 1 + self.size(left) + self.size(right);
        let sum = self.effective(&entry) + self.sum(left) + self.sum(right);
        let n = &mut self.nodes[node];
        n.size = size;
        n.sum = sum;
    }

    fn next_priority(&mut self) -> u32 {
        // xorshift32
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        x
    }

    fn alloc(&mut self, entry: Entry) -> usize {
        let node = Node {
            left: NIL,
            right: NIL,
            priority: self.next_priority(),
            size: 1,
            sum: self.effective(&entry),
            entry,
        };
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Builds a treap of `count` equal entries in linear time.
    fn build(&mut self, count: usize, entry: Entry) -> usize {
        // Cartesian-tree construction over random priorities: the right spine
        // lives on the stack, and popped nodes are complete.
        let mut spine: Vec<usize> = Vec::new();
        for _ in 0..count {
            let node = self.alloc(entry);
            let mut last = NIL;
            while let Some(&top) = spine.last() {
                if self.nodes[top].priority >= self.nodes[node].priority {
                    break;
                }
                spine.pop();
                self.pull(top);
                last = top;
            }
            self.nodes[node].left = last;
            if let Some(&top) = spine.last() {
                self.nodes[top].right = node;
            }
            spine.push(node);
        }
        let mut root = NIL;
        while let Some(top) = spine.pop() {
            self.pull(top);
            root = top;
        }
        root
    }

    /// Splits `node` into the first `k` slots and the rest.
    fn split(&mut self, node: usize, k: usize) -> (usize, usize) {
        if node == NIL {
            return (NIL, NIL);
        }
        let left = self.nodes[node].left;
        let left_size = self.size(left);
        if k <= left_size {
            let (a, b) = self.split(left, k);
            self.nodes[node].left = b;
            self.pull(node);
            (a, node)
        } else {
            let right = self.nodes[node].right;
            let (a, b) = self.split(right, k - left_size - 1);
            self.nodes[node].right = a;
            self.pull(node);
            (node, b)
        }
    }

    fn merge(&mut self, a: usize, b: usize) -> usize {
        if a == NIL {
            return b;
        }
        if b == NIL {
            return a;
        }
        if self.nodes[a].priority > self.nodes[b].priority {
            let right = self.nodes[a].right;
            let merged = self.merge(right, b);
            self.nodes[a].right = merged;
            self.pull(a);
            a
        } else {
            let left = self.nodes[b].left;
            let merged = self.merge(a, left);
            self.nodes[b].left = merged;
            self.pull(b);
            b
        }
    }

    fn modify(&mut self, node: usize, index: usize, f: &mut dyn FnMut(&mut Entry)) {
        let left = self.nodes[node].left;
        let left_size = self.size(left);
        if index < left_size {
            self.modify(left, index, f);
        } else if index == left_size {
            f(&mut self.nodes[node].entry);
        } else {
            let right = self.nodes[node].right;
            self.modify(right, index - left_size - 1, f);
        }
        self.pull(node);
    }

    fn visit_mut(&mut self, root: usize, f: &mut dyn FnMut(&mut Entry)) {
        let mut stack = alloc::vec![root];
        while let Some(node) = stack.pop() {
            if node == NIL {
                continue;
            }
            f(&mut self.nodes[node].entry);
            stack.push(self.nodes[node].left);
            stack.push(self.nodes[node].right);
        }
    }

    /// Recomputes sizes and sums bottom-up for a whole subtree.
    fn repull_subtree(&mut self, root: usize) {
        if root == NIL {
            return;
        }
        let mut order = Vec::with_capacity(self.size(root));
        let mut stack = alloc::vec![root];
        while let Some(node) = stack.pop() {
            order.push(node);
            for child in [self.nodes[node].left, self.nodes[node].right] {
                if child != NIL {
                    stack.push(child);
                }
            }
        }
        // Parents precede their children in `order`.
        for &node in order.iter().rev() {
            self.pull(node);
        }
    }

    fn release(&mut self, root: usize) {
        let mut stack = alloc::vec![root];
        while let Some(node) = stack.pop() {
            if node == NIL {
                continue;
            }
            stack.push(self.nodes[node].left);
            stack.push(self.nodes[node].right);
            self.free.push(node);
        }
    }

    fn entry(&self, mut index: usize) -> Option<&Entry> {
        let mut node = self.root;
        while node != NIL {
            let n = &self.nodes[node];
            let left_size = self.size(n.left);
            if index < left_size {
                node = n.left;
            } else if index == left_size {
                return Some(&n.entry);
            } else {
                index -= left_size + 1;
                node = n.right;
            }
        }
        None
    }

    /// Sum of the first `k` slots.
    fn sum_before(&self, mut k: usize) -> f64 {
        let mut node = self.root;
        let mut acc = 0.0;
        while node != NIL && k > 0 {
            let n = &self.nodes[node];
            let left_size = self.size(n.left);
            if k <= left_size {
                node = n.left;
            } else {
                acc += self.sum(n.left) + self.effective(&n.entry);
                k -= left_size + 1;
                node = n.right;
            }
        }
        acc
    }

    fn search(&self, offset: f64, strict: bool) -> usize {
        let len = self.len();
        if len == 0 {
            return 0;
        }
        let reaches = |extent: f64, remaining: f64| {
            if strict {
                extent > remaining
            } else {
                extent >= remaining
            }
        };
        let mut node = self.root;
        let mut index = 0;
        let mut remaining = offset;
        while node != NIL {
            let n = &self.nodes[node];
            if n.left != NIL && reaches(self.sum(n.left), remaining) {
                node = n.left;
                continue;
            }
            remaining -= self.sum(n.left);
            index += self.size(n.left);
            let own = self.effective(&n.entry);
            if reaches(own, remaining) {
                return index;
            }
            remaining -= own;
            index += 1;
            node = n.right;
        }
        index.min(len - 1)
    }
}

impl ExtentModel for OffsetIndex {
    fn len(&self) -> usize {
        self.len()
    }

    fn total_extent(&self) -> f64 {
        self.total_length()
    }

    fn extent_of(&self, index: usize) -> f64 {
        self.entry(index).map_or(0.0, |e| self.effective(e))
    }

    fn offset_of(&self, index: usize) -> f64 {
        self.offset_before(index)
    }

    fn index_at_offset(&self, offset: f64) -> usize {
        self.index_at_offset(offset)
    }
}

fn sanitize(length: f64) -> f64 {
    if length.is_sign_negative() { 0.0 } else { length }
}
