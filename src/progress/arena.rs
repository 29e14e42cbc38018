//! Node storage for a progress tree.
//!
//! Nodes are stored in a flat vector and refer to each other by [`NodeId`].
//! Each slot lists the parents that must be invalidated when the node
//! changes; the root criterion's slot lists the tree itself, whose
//! `complete` memo mirrors the root's achieved state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::Memo;
use crate::criterion::{Criterion, CriterionKind};
use crate::error::{ProgressError, Result};
use crate::external::{Clock, Env, Timestamp};
use crate::progress::combinator::{self, CombinatorProgress, Mode};
use crate::progress::{
    EmptyProgress, LeafProgress, NodeId, ProgressNode, SavedProgress, ScoreProgress, WireProgress,
};

#[derive(Debug, Clone, Copy)]
enum Parent {
    Node(NodeId),
    Root,
}

#[derive(Debug)]
struct Slot {
    node: ProgressNode,
    parents: Vec<Parent>,
}

#[derive(Debug)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
    index: HashMap<String, NodeId>,
    root: NodeId,
    complete: Memo<bool>,
}

impl Arena {
    /// Build one node per criterion reachable from `root`.
    ///
    /// A criterion shared by several combinators gets a single node with one
    /// parent link per use. Two distinct criteria with the same name are
    /// rejected, since persisted progress is keyed by name.
    pub(super) fn build(root: &Arc<Criterion>, env: &Env<'_>) -> Result<Self> {
        let mut arena = Self {
            slots: Vec::new(),
            index: HashMap::new(),
            root: NodeId(0),
            complete: Memo::new(),
        };
        let root_id = arena.insert(root, env)?;
        arena.slots[root_id.0].parents.push(Parent::Root);
        arena.root = root_id;
        arena.check_persisted_keys()?;

        for slot in &mut arena.slots {
            if let ProgressNode::Leaf(leaf) = &mut slot.node {
                leaf.attach_trigger(env);
            }
        }
        Ok(arena)
    }

    fn insert(&mut self, criterion: &Arc<Criterion>, env: &Env<'_>) -> Result<NodeId> {
        if let Some(&id) = self.index.get(criterion.name()) {
            if Arc::ptr_eq(self.slots[id.0].node.criterion(), criterion) {
                return Ok(id);
            }
            return Err(duplicate_name(criterion));
        }

        let node = match criterion.kind() {
            CriterionKind::Leaf => ProgressNode::Leaf(LeafProgress::new(criterion.clone())),
            CriterionKind::Score { .. } => {
                let score = ScoreProgress::new(criterion.clone()).ok_or_else(|| {
                    ProgressError::invalid_argument(format!("'{}' has no goal", criterion))
                })?;
                ProgressNode::Score(score)
            }
            CriterionKind::Empty => {
                let mut empty = EmptyProgress::new(criterion.clone());
                empty.fix_timestamp(env.clock.now())?;
                ProgressNode::Empty(empty)
            }
            CriterionKind::And(children) | CriterionKind::Or(children) => {
                let mode = if matches!(criterion.kind(), CriterionKind::And(_)) {
                    Mode::All
                } else {
                    Mode::Any
                };
                let ids = children
                    .iter()
                    .map(|child| self.insert(child, env))
                    .collect::<Result<Vec<_>>>()?;
                let node = CombinatorProgress::new(criterion.clone(), mode, ids);
                match mode {
                    Mode::All => ProgressNode::And(node),
                    Mode::Any => ProgressNode::Or(node),
                }
            }
        };

        // A descendant may have claimed the name while the children were built.
        if self.index.contains_key(criterion.name()) {
            return Err(duplicate_name(criterion));
        }

        let id = NodeId(self.slots.len());
        let children = node
            .as_combinator()
            .map(|c| c.children().to_vec())
            .unwrap_or_default();
        self.slots.push(Slot {
            node,
            parents: Vec::new(),
        });
        self.index.insert(criterion.name().to_string(), id);
        for child in children {
            self.slots[child.0].parents.push(Parent::Node(id));
        }
        Ok(id)
    }

    /// Leaf names, score names and score sub-identifiers share one key
    /// space in saved and wire progress, so each may be claimed only once.
    fn check_persisted_keys(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for slot in &self.slots {
            let keys: Vec<&str> = match &slot.node {
                ProgressNode::Leaf(node) => vec![node.criterion().name()],
                ProgressNode::Score(node) => std::iter::once(node.criterion().name())
                    .chain(node.sub_ids().iter().map(String::as_str))
                    .collect(),
                _ => continue,
            };
            for key in keys {
                if !seen.insert(key) {
                    return Err(ProgressError::invalid_argument(format!(
                        "progress key '{}' is claimed twice (by '{}')",
                        key,
                        slot.node.criterion()
                    )));
                }
            }
        }
        Ok(())
    }

    pub(super) fn root(&self) -> NodeId {
        self.root
    }

    pub(super) fn lookup(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub(super) fn node(&self, id: NodeId) -> &ProgressNode {
        &self.slots[id.0].node
    }

    pub(super) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(super) fn nodes(&self) -> impl Iterator<Item = &ProgressNode> {
        self.slots.iter().map(|slot| &slot.node)
    }

    pub(super) fn get(&self, id: NodeId) -> Option<Timestamp> {
        match &self.slots[id.0].node {
            ProgressNode::Empty(node) => node.get(),
            ProgressNode::Leaf(node) => node.get(),
            ProgressNode::Score(node) => node.get(),
            ProgressNode::And(node) | ProgressNode::Or(node) => node.get_or_compute(|| {
                combinator::combine(node.mode(), node.children().iter().map(|&c| self.get(c)))
            }),
        }
    }

    pub(super) fn is_complete(&self) -> bool {
        self.complete
            .get_or_compute(|| self.get(self.root).is_some())
    }

    /// Copy of a combinator's mode and child list, taken before any child is
    /// touched so the iteration cannot observe changes made during it.
    pub(super) fn snapshot_children(&self, id: NodeId) -> Option<(Mode, Vec<NodeId>)> {
        self.slots[id.0]
            .node
            .as_combinator()
            .map(|c| (c.mode(), c.children().to_vec()))
    }

    /// Drop the node's own memo without notifying parents.
    pub(super) fn clear_cache(&self, id: NodeId) {
        if let Some(c) = self.slots[id.0].node.as_combinator() {
            c.invalidate();
        }
    }

    /// Drop the node's memo and every memo above it, up to `complete`.
    pub(super) fn invalidate(&self, id: NodeId) {
        let slot = &self.slots[id.0];
        if let Some(c) = slot.node.as_combinator() {
            c.invalidate();
        }
        for parent in &slot.parents {
            match *parent {
                Parent::Node(parent) => self.invalidate(parent),
                Parent::Root => self.complete.invalidate(),
            }
        }
    }

    pub(super) fn invalidate_root(&self) {
        self.complete.invalidate();
    }

    pub(super) fn invalidate_all(&self) {
        for slot in &self.slots {
            if let Some(c) = slot.node.as_combinator() {
                c.invalidate();
            }
        }
        self.complete.invalidate();
    }

    pub(super) fn grant(
        &mut self,
        env: &Env<'_>,
        id: NodeId,
        on_change: &mut dyn FnMut(),
    ) -> Option<Timestamp> {
        let mut changed = false;
        let result = match &mut self.slots[id.0].node {
            ProgressNode::Empty(node) => node.grant(),
            ProgressNode::Leaf(node) => node.grant(env, &mut || changed = true),
            ProgressNode::Score(node) => node.grant(env, &mut || changed = true),
            ProgressNode::And(_) | ProgressNode::Or(_) => {
                return combinator::grant(self, env, id, on_change)
            }
        };
        if changed {
            self.invalidate(id);
            on_change();
        }
        result
    }

    pub(super) fn revoke(
        &mut self,
        env: &Env<'_>,
        id: NodeId,
        on_change: &mut dyn FnMut(),
    ) -> Option<Timestamp> {
        let mut changed = false;
        let result = match &mut self.slots[id.0].node {
            ProgressNode::Empty(node) => node.revoke(),
            ProgressNode::Leaf(node) => node.revoke(env, &mut || changed = true),
            ProgressNode::Score(node) => node.revoke(env, &mut || changed = true),
            ProgressNode::And(_) | ProgressNode::Or(_) => {
                return combinator::revoke(self, env, id, on_change)
            }
        };
        if changed {
            self.invalidate(id);
            on_change();
        }
        result
    }

    pub(super) fn set_score(
        &mut self,
        env: &Env<'_>,
        id: NodeId,
        score: i64,
        on_change: &mut dyn FnMut(),
    ) -> Result<Option<Timestamp>> {
        let mut changed = false;
        let result = match &mut self.slots[id.0].node {
            ProgressNode::Score(node) => node.set_score(env, score, &mut || changed = true)?,
            other => {
                return Err(ProgressError::invalid_argument(format!(
                    "'{}' is a {} criterion, not a score",
                    other.criterion(),
                    other.kind_name()
                )))
            }
        };
        if changed {
            self.invalidate(id);
            on_change();
        }
        Ok(result)
    }

    /// Names and sub-identifiers that may appear in saved progress.
    pub(super) fn persisted_keys(&self) -> HashSet<&str> {
        let mut keys = HashSet::new();
        for slot in &self.slots {
            match &slot.node {
                ProgressNode::Leaf(node) => {
                    keys.insert(node.criterion().name());
                }
                ProgressNode::Score(node) => {
                    keys.insert(node.criterion().name());
                    keys.extend(node.sub_ids().iter().map(String::as_str));
                }
                _ => {}
            }
        }
        keys
    }

    pub(super) fn save(&self, out: &mut SavedProgress, clock: &dyn Clock) {
        for slot in &self.slots {
            match &slot.node {
                ProgressNode::Leaf(node) => node.save(out),
                ProgressNode::Score(node) => node.save(out, clock),
                _ => {}
            }
        }
    }

    pub(super) fn load(&mut self, saved: &SavedProgress, env: &Env<'_>) {
        for slot in &mut self.slots {
            match &mut slot.node {
                ProgressNode::Leaf(node) => node.load(saved, env),
                ProgressNode::Score(node) => node.load(saved),
                _ => {}
            }
        }
        self.invalidate_all();
    }

    pub(super) fn fill(&self, out: &mut WireProgress, clock: &dyn Clock) {
        for slot in &self.slots {
            match &slot.node {
                ProgressNode::Leaf(node) => node.fill(out),
                ProgressNode::Score(node) => node.fill(out, clock),
                _ => {}
            }
        }
    }

    pub(super) fn fill_dirty(&mut self, out: &mut WireProgress, clock: &dyn Clock) {
        for slot in &mut self.slots {
            match &mut slot.node {
                ProgressNode::Leaf(node) => node.fill_dirty(out),
                ProgressNode::Score(node) => node.fill_dirty(out, clock),
                _ => {}
            }
        }
    }

    pub(super) fn mark_synced(&mut self) {
        for slot in &mut self.slots {
            match &mut slot.node {
                ProgressNode::Leaf(node) => node.mark_synced(),
                ProgressNode::Score(node) => node.mark_synced(),
                _ => {}
            }
        }
    }

    pub(super) fn release_triggers(&mut self, env: &Env<'_>) {
        for slot in &mut self.slots {
            if let ProgressNode::Leaf(node) = &mut slot.node {
                node.detach_trigger(env);
            }
        }
    }
}

fn duplicate_name(criterion: &Criterion) -> ProgressError {
    ProgressError::invalid_argument(format!(
        "two different criteria are named '{}'",
        criterion
    ))
}

/// Read-only handle to one node of a progress tree.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    arena: &'a Arena,
    id: NodeId,
}

impl<'a> NodeView<'a> {
    pub(super) fn new(arena: &'a Arena, id: NodeId) -> Self {
        Self { arena, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a ProgressNode {
        self.arena.node(self.id)
    }

    pub fn criterion(&self) -> &'a Arc<Criterion> {
        self.node().criterion()
    }

    /// Achieving timestamp, or `None` when unachieved.
    pub fn get(&self) -> Option<Timestamp> {
        self.arena.get(self.id)
    }

    pub fn is_achieved(&self) -> bool {
        self.get().is_some()
    }

    pub fn as_leaf(&self) -> Option<&'a LeafProgress> {
        match self.node() {
            ProgressNode::Leaf(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_score(&self) -> Option<&'a ScoreProgress> {
        match self.node() {
            ProgressNode::Score(node) => Some(node),
            _ => None,
        }
    }

    /// Views of a combinator's children, in definition order.
    pub fn children(&self) -> Vec<NodeView<'a>> {
        self.node()
            .as_combinator()
            .map(|c| {
                c.children()
                    .iter()
                    .map(|&id| NodeView::new(self.arena, id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for NodeView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeView")
            .field("criterion", &self.criterion().name())
            .field("kind", &self.node().kind_name())
            .field("achieved_at", &self.get())
            .finish()
    }
}
