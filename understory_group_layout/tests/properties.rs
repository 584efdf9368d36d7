// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests over randomly shaped hierarchies and edit sequences.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use proptest::prelude::*;
use proptest::sample::Index;
use understory_group_layout::{
    HierarchyAdapter, LayoutConfig, LayoutEngine, LayoutShape, SourceOptions,
};
use understory_slot_index::OffsetIndex;

#[derive(Clone, Debug, Default)]
struct Tree {
    children: BTreeMap<Option<u32>, Vec<u32>>,
    next: u32,
}

impl Tree {
    /// Root groups of subgroups of `n` leaves each.
    fn build(shape: &[Vec<usize>]) -> Self {
        let mut tree = Self::default();
        for subgroups in shape {
            let group = tree.push(None);
            for &leaves in subgroups {
                let subgroup = tree.push(Some(group));
                for _ in 0..leaves {
                    tree.push(Some(subgroup));
                }
            }
        }
        tree
    }

    fn fresh(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    fn push(&mut self, parent: Option<u32>) -> u32 {
        let id = self.fresh();
        self.children.entry(parent).or_default().push(id);
        id
    }

    fn insert(&mut self, parent: Option<u32>, index: usize, id: u32) {
        self.children.entry(parent).or_default().insert(index, id);
    }

    fn remove(&mut self, parent: Option<u32>, index: usize) -> u32 {
        self.children.get_mut(&parent).unwrap().remove(index)
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

#[derive(Clone, Debug)]
enum Op {
    Collapse(Index),
    Expand(Index),
    Add(Index, Index, bool),
    Remove(Index, Index),
}

fn shape() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0_usize..4, 0..4), 1..6)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<Index>().prop_map(Op::Collapse),
        any::<Index>().prop_map(Op::Expand),
        (any::<Index>(), any::<Index>(), any::<bool>())
            .prop_map(|(container, index, group)| Op::Add(container, index, group)),
        (any::<Index>(), any::<Index>())
            .prop_map(|(container, index)| Op::Remove(container, index)),
    ]
}

type Layout = (LayoutConfig, SourceOptions);

fn stacked(count: usize) -> LayoutConfig {
    LayoutConfig::new().with_shape(LayoutShape::Stacked {
        stack_count: NonZeroUsize::new(count).unwrap(),
    })
}

fn wrap(available: f64) -> LayoutConfig {
    LayoutConfig::new().with_shape(LayoutShape::Wrap {
        available_opposite_length: available,
        default_item_opposite_length: 30.0,
    })
}

/// Every shape, with the grouping depths it supports.
fn layout() -> impl Strategy<Value = Layout> {
    prop_oneof![
        Just((LayoutConfig::new(), SourceOptions::default())),
        Just((stacked(2), SourceOptions::grouped(1))),
        Just((stacked(3), SourceOptions::grouped(2))),
        Just((wrap(100.0), SourceOptions::default())),
        Just((wrap(100.0), SourceOptions::grouped(1))),
        Just((wrap(70.0), SourceOptions::grouped(2))),
    ]
}

fn engine(tree: Tree, (config, options): Layout) -> LayoutEngine<Tree> {
    LayoutEngine::new(tree, config, options).unwrap()
}

/// Items, levels and flat slots of every item row.
fn rows(engine: &LayoutEngine<Tree>) -> Vec<Vec<(Option<u32>, usize, usize)>> {
    (0..engine.flat_row_count())
        .map(|row| {
            engine
                .item_infos_at_slot(row)
                .into_iter()
                .map(|info| (info.item, info.level, info.id))
                .collect()
        })
        .collect()
}

fn groups(engine: &LayoutEngine<Tree>) -> Vec<u32> {
    engine.groups().map(|node| *node.item()).collect()
}

type Snapshot = (usize, usize, Vec<(u32, usize, usize, bool)>, Vec<bool>);

/// Everything an add followed by the matching remove must give back.
fn snapshot(engine: &LayoutEngine<Tree>) -> Snapshot {
    (
        engine.total_slot_count(),
        engine.visible_line_count(),
        engine
            .groups()
            .map(|node| {
                (
                    *node.item(),
                    node.index(),
                    node.last_sub_item_slot(),
                    node.is_expanded(),
                )
            })
            .collect(),
        (0..engine.total_slot_count())
            .map(|slot| engine.is_slot_collapsed(slot))
            .collect(),
    )
}

fn apply(engine: &mut LayoutEngine<Tree>, op: &Op) {
    let groups = groups(engine);
    let containers: Vec<Option<u32>> = std::iter::once(None)
        .chain(groups.iter().copied().map(Some))
        .collect();
    match op {
        Op::Collapse(pick) if !groups.is_empty() => {
            engine.collapse(pick.get(&groups));
        }
        Op::Expand(pick) if !groups.is_empty() => {
            engine.expand(pick.get(&groups));
        }
        Op::Add(container, index, group) => {
            let container = *container.get(&containers);
            let index = index.index(engine.adapter().child_count(container.as_ref()) + 1);
            let tree = engine.adapter_mut();
            let id = tree.fresh();
            if *group {
                tree.push(Some(id));
                tree.push(Some(id));
            }
            tree.insert(container, index, id);
            engine.add_item(container.as_ref(), &id, index).unwrap();
        }
        Op::Remove(container, index) => {
            let container = *container.get(&containers);
            let count = engine.adapter().child_count(container.as_ref());
            if count == 0 {
                return;
            }
            let index = index.index(count);
            let id = engine.adapter_mut().remove(container, index);
            engine.remove_item(container.as_ref(), &id, index).unwrap();
        }
        Op::Collapse(_) | Op::Expand(_) => {}
    }
}

fn check_invariants(engine: &LayoutEngine<Tree>, layout: Layout) -> Result<(), TestCaseError> {
    let spans: Vec<(usize, usize)> = engine
        .groups()
        .map(|node| (node.index(), node.last_sub_item_slot()))
        .collect();
    for &(index, last) in &spans {
        prop_assert!(last >= index);
        prop_assert!(last < engine.flat_slot_count());
    }
    for pair in spans.windows(2) {
        let ((a, a_last), (b, b_last)) = (pair[0], pair[1]);
        prop_assert!(b > a);
        prop_assert!(
            b > a_last || b_last <= a_last,
            "spans {:?} and {:?} overlap",
            pair[0],
            pair[1]
        );
    }

    let total = engine.total_slot_count();
    if total > 0 {
        prop_assert_eq!(
            engine.visible_line_count(),
            total - engine.collapsed_slots_count(0, total - 1)
        );
    }
    prop_assert_eq!(engine.lines(0, true).count(), engine.visible_line_count());

    // The incremental tables describe the same rows as a fresh index.
    let fresh = self::engine(engine.adapter().clone(), layout);
    prop_assert_eq!(fresh.total_slot_count(), total);
    prop_assert_eq!(rows(engine), rows(&fresh));
    for flat in 0..engine.flat_slot_count() {
        let ours = engine.item_at_slot(flat).map(|info| (info.item, info.level));
        let theirs = fresh.item_at_slot(flat).map(|info| (info.item, info.level));
        prop_assert_eq!(ours, theirs, "flat slot {}", flat);
    }
    for node in fresh.groups() {
        if let Some(ours) = engine.group_info(node.item()) {
            prop_assert_eq!(ours.index(), node.index());
            prop_assert_eq!(ours.last_sub_item_slot(), node.last_sub_item_slot());
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn visible_slots_skip_collapsed_rows(
        shape in shape(),
        layout in layout(),
        picks in prop::collection::vec(any::<Index>(), 0..4),
    ) {
        let mut engine = engine(Tree::build(&shape), layout);
        let groups = groups(&engine);
        prop_assume!(!groups.is_empty());
        for pick in &picks {
            engine.collapse(pick.get(&groups));
        }
        for slot in 0..engine.total_slot_count() {
            let line = engine.visible_slot(slot);
            prop_assert_eq!(line, slot - engine.collapsed_slots_count(0, slot));
            if !engine.is_slot_collapsed(slot) {
                prop_assert_eq!(engine.slot_at_visible_line(line), Some(slot));
            }
        }
    }

    #[test]
    fn offsets_round_trip(lengths in prop::collection::vec(1_u32..50, 1..200)) {
        let mut offsets = OffsetIndex::with_len(lengths.len(), 1.0);
        for (index, &length) in lengths.iter().enumerate() {
            offsets.update(index, f64::from(length));
        }
        for index in 0..lengths.len() {
            prop_assert_eq!(offsets.index_from_offset(offsets.offset_from_index(index)), index);
        }
    }

    #[test]
    fn collapse_then_expand_is_identity(
        shape in shape(),
        layout in layout(),
        pick in any::<Index>(),
    ) {
        let mut engine = engine(Tree::build(&shape), layout);
        let groups = groups(&engine);
        prop_assume!(!groups.is_empty());
        let group = pick.get(&groups);
        let before = snapshot(&engine);
        let collapsed = engine.collapse(group);
        prop_assert_eq!(collapsed, engine.group_info(group).unwrap().span() > 1);
        engine.expand(group);
        prop_assert_eq!(snapshot(&engine), before);
    }

    #[test]
    fn add_then_remove_is_identity(
        shape in shape(),
        layout in layout(),
        collapse in prop::collection::vec(any::<Index>(), 0..3),
        container in any::<Index>(),
        index in any::<Index>(),
        group in any::<bool>(),
    ) {
        let mut engine = engine(Tree::build(&shape), layout);
        let groups = groups(&engine);
        if !groups.is_empty() {
            for pick in &collapse {
                engine.collapse(pick.get(&groups));
            }
        }
        let before = snapshot(&engine);

        let containers: Vec<Option<u32>> =
            std::iter::once(None).chain(groups.iter().copied().map(Some)).collect();
        let container = *container.get(&containers);
        let index = index.index(engine.adapter().child_count(container.as_ref()) + 1);
        let tree = engine.adapter_mut();
        let id = tree.fresh();
        if group {
            tree.push(Some(id));
            tree.push(Some(id));
        }
        tree.insert(container, index, id);

        let added = engine.add_item(container.as_ref(), &id, index).unwrap();
        prop_assert_eq!(engine.total_slot_count(), before.0 + added.slot_count);
        engine.adapter_mut().remove(container, index);
        let removed = engine.remove_item(container.as_ref(), &id, index).unwrap();
        prop_assert_eq!(added, removed);
        prop_assert_eq!(snapshot(&engine), before);
    }

    #[test]
    fn edit_sequences_keep_tables_consistent(
        shape in shape(),
        layout in layout(),
        ops in prop::collection::vec(op(), 1..12),
    ) {
        let mut engine = engine(Tree::build(&shape), layout);
        check_invariants(&engine, layout)?;
        for op in &ops {
            apply(&mut engine, op);
            check_invariants(&engine, layout)?;
        }
    }

    #[test]
    fn small_groups_gaining_children_match_a_fresh_index(
        sizes in prop::collection::vec(0_usize..2, 1..8),
        layout in layout(),
        order in any::<Index>(),
        extra in 1_usize..3,
    ) {
        let mut tree = Tree::default();
        let mut groups = Vec::new();
        for &leaves in &sizes {
            let group = tree.push(None);
            for _ in 0..leaves {
                tree.push(Some(group));
            }
            groups.push(group);
        }
        let mut engine = engine(tree, layout);

        // Visit the groups starting from an arbitrary one.
        let len = groups.len();
        let start = order.index(len);
        for step in 0..len {
            let group = groups[(start + step) % len];
            for _ in 0..extra {
                let index = engine.adapter().child_count(Some(&group));
                let leaf = engine.adapter_mut().push(Some(group));
                engine.add_item(Some(&group), &leaf, index).unwrap();
            }
        }
        check_invariants(&engine, layout)?;
        for group in &groups {
            prop_assert!(engine.group_info(group).is_some());
        }
    }
}
