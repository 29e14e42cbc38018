//! And/Or progress.
//!
//! Combinators hold no state of their own beyond a memo of their derived
//! value. Grant and revoke fan out to every child, in definition order, with
//! no short-circuit and no rollback: when a conjunction's grant is refused
//! for one child, siblings that were granted before stay granted.

use std::sync::Arc;

use crate::cache::Memo;
use crate::criterion::Criterion;
use crate::external::{Env, Timestamp};
use crate::progress::arena::Arena;
use crate::progress::NodeId;

/// How children combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Achieved when every child is, at the latest child timestamp.
    All,
    /// Achieved when any child is, at the latest achieved child timestamp.
    Any,
}

/// Progress of an And or Or criterion.
#[derive(Debug)]
pub struct CombinatorProgress {
    criterion: Arc<Criterion>,
    mode: Mode,
    children: Vec<NodeId>,
    cached: Memo<Option<Timestamp>>,
}

impl CombinatorProgress {
    pub(crate) fn new(criterion: Arc<Criterion>, mode: Mode, children: Vec<NodeId>) -> Self {
        Self {
            criterion,
            mode,
            children,
            cached: Memo::new(),
        }
    }

    pub fn criterion(&self) -> &Arc<Criterion> {
        &self.criterion
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn get_or_compute(&self, compute: impl FnOnce() -> Option<Timestamp>) -> Option<Timestamp> {
        self.cached.get_or_compute(compute)
    }

    pub(crate) fn invalidate(&self) {
        self.cached.invalidate();
    }
}

/// Combine child values under `mode`.
pub fn combine(mode: Mode, values: impl IntoIterator<Item = Option<Timestamp>>) -> Option<Timestamp> {
    match mode {
        Mode::All => {
            let mut latest = None;
            for value in values {
                latest = latest.max(Some(value?));
            }
            latest
        }
        Mode::Any => values.into_iter().flatten().max(),
    }
}

/// Grant every child. A conjunction with any refused child reports `None`.
pub(super) fn grant(
    arena: &mut Arena,
    env: &Env<'_>,
    id: NodeId,
    on_change: &mut dyn FnMut(),
) -> Option<Timestamp> {
    let Some((mode, children)) = arena.snapshot_children(id) else {
        return arena.get(id);
    };

    let mut changed = false;
    let mut refused = false;
    for child in children {
        if arena.grant(env, child, &mut || changed = true).is_none() {
            refused = true;
        }
    }

    if changed {
        arena.invalidate(id);
        on_change();
    }

    match mode {
        Mode::All if refused => None,
        _ => arena.get(id),
    }
}

/// Revoke every child and return the value in effect before the call.
pub(super) fn revoke(
    arena: &mut Arena,
    env: &Env<'_>,
    id: NodeId,
    on_change: &mut dyn FnMut(),
) -> Option<Timestamp> {
    let previous = arena.get(id);
    let Some((_, children)) = arena.snapshot_children(id) else {
        return previous;
    };

    let mut changed = false;
    for child in children {
        arena.revoke(env, child, &mut || changed = true);
    }

    arena.clear_cache(id);
    if changed {
        arena.invalidate(id);
        on_change();
    }
    previous
}
