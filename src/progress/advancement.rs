//! Progress of one player toward one advancement.
//!
//! `AdvancementProgress` is the only way to mutate a progress tree. It routes
//! every grant, revoke and score change through the node that owns the
//! criterion, lets invalidation climb the fixed parent links, and keeps the
//! memoized completion flag in step with the root criterion.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::UnknownKeyPolicy;
use crate::criterion::{Advancement, Criterion};
use crate::error::{ProgressError, Result};
use crate::external::{Collaborators, Timestamp};
use crate::progress::arena::{Arena, NodeView};
use crate::progress::{NodeId, ProgressNode, SavedProgress, WireProgress};
use crate::storage::{ProgressRecord, ProgressStore};

/// Tunables for a progress tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressOptions {
    /// What to do with saved keys that match no leaf or score criterion.
    pub unknown_keys: UnknownKeyPolicy,
}

/// Progress of one owner toward one advancement.
///
/// Unachieved leaves stay attached to the trigger registry until they are
/// granted, [`release_triggers`](Self::release_triggers) is called, or the
/// tree is dropped.
#[derive(Debug)]
pub struct AdvancementProgress {
    owner: String,
    advancement: Advancement,
    hooks: Collaborators,
    options: ProgressOptions,
    arena: Arena,
}

impl AdvancementProgress {
    /// Build the progress tree for `owner` with default options.
    ///
    /// Unachieved leaves attach to the trigger registry; empty criteria are
    /// stamped with the clock's current time.
    pub fn new(
        owner: impl Into<String>,
        advancement: &Advancement,
        hooks: Collaborators,
    ) -> Result<Self> {
        Self::with_options(owner, advancement, hooks, ProgressOptions::default())
    }

    /// Build the progress tree for `owner`.
    pub fn with_options(
        owner: impl Into<String>,
        advancement: &Advancement,
        hooks: Collaborators,
        options: ProgressOptions,
    ) -> Result<Self> {
        let owner = owner.into();
        let arena = Arena::build(advancement.root(), &hooks.env(&owner))?;
        tracing::debug!(
            "built progress for {} on {} ({} nodes)",
            owner,
            advancement.id(),
            arena.len()
        );
        Ok(Self {
            owner,
            advancement: advancement.clone(),
            hooks,
            options,
            arena,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn advancement(&self) -> &Advancement {
        &self.advancement
    }

    pub fn options(&self) -> ProgressOptions {
        self.options
    }

    /// Every progress node, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &ProgressNode> {
        self.arena.nodes()
    }

    /// The node tracking `criterion`.
    pub fn get(&self, criterion: &Criterion) -> Result<NodeView<'_>> {
        self.resolve(criterion)
            .map(|id| NodeView::new(&self.arena, id))
    }

    /// The node tracking the criterion called `name`.
    pub fn get_by_name(&self, name: &str) -> Result<NodeView<'_>> {
        self.arena
            .lookup(name)
            .map(|id| NodeView::new(&self.arena, id))
            .ok_or_else(|| ProgressError::not_found(name))
    }

    /// The node tracking the root criterion.
    pub fn root(&self) -> NodeView<'_> {
        NodeView::new(&self.arena, self.arena.root())
    }

    fn resolve(&self, criterion: &Criterion) -> Result<NodeId> {
        let id = self
            .arena
            .lookup(criterion.name())
            .ok_or_else(|| ProgressError::not_found(criterion.name()))?;
        let tracked = self.arena.node(id).criterion();
        if std::ptr::eq(tracked.as_ref(), criterion) || tracked.as_ref() == criterion {
            Ok(id)
        } else {
            Err(ProgressError::not_found(criterion.name()))
        }
    }

    /// Grant `criterion`. `Ok(None)` means the grant was refused.
    pub fn grant(&mut self, criterion: &Criterion) -> Result<Option<Timestamp>> {
        self.grant_with(criterion, || {})
    }

    /// Grant `criterion`, calling `on_change` if anything observable changed.
    pub fn grant_with(
        &mut self,
        criterion: &Criterion,
        mut on_change: impl FnMut(),
    ) -> Result<Option<Timestamp>> {
        let id = self.resolve(criterion)?;
        let env = self.hooks.env(&self.owner);
        let mut changed = false;
        let result = self.arena.grant(&env, id, &mut || changed = true);
        if changed {
            self.invalidate();
            on_change();
        }
        Ok(result)
    }

    /// Revoke `criterion`. Returns the timestamp that was in effect before.
    pub fn revoke(&mut self, criterion: &Criterion) -> Result<Option<Timestamp>> {
        self.revoke_with(criterion, || {})
    }

    /// Revoke `criterion`, calling `on_change` if anything observable changed.
    pub fn revoke_with(
        &mut self,
        criterion: &Criterion,
        mut on_change: impl FnMut(),
    ) -> Result<Option<Timestamp>> {
        let id = self.resolve(criterion)?;
        let env = self.hooks.env(&self.owner);
        let mut changed = false;
        let result = self.arena.revoke(&env, id, &mut || changed = true);
        if changed {
            self.invalidate();
            on_change();
        }
        Ok(result)
    }

    /// Set the score of a score criterion.
    ///
    /// Fails with `InvalidArgument` when `score` is outside `[0, goal]` or
    /// the criterion is not a score. Returns the achieving timestamp after
    /// the call.
    pub fn set_score(&mut self, criterion: &Criterion, score: i64) -> Result<Option<Timestamp>> {
        let id = self.resolve(criterion)?;
        let env = self.hooks.env(&self.owner);
        let mut changed = false;
        let result = self
            .arena
            .set_score(&env, id, score, &mut || changed = true)?;
        if changed {
            self.invalidate();
        }
        Ok(result)
    }

    /// Grant `criterion`, reporting a refusal as the minimum timestamp.
    #[deprecated(note = "use `grant`, which reports a refusal as `None`")]
    pub fn grant_or_min(&mut self, criterion: &Criterion) -> Result<Timestamp> {
        Ok(self
            .grant(criterion)?
            .unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    /// Whether the root criterion is achieved.
    pub fn is_complete(&self) -> bool {
        self.arena.is_complete()
    }

    /// When the root criterion was achieved.
    pub fn completed_at(&self) -> Option<Timestamp> {
        self.root().get()
    }

    /// Drop the memoized completion flag.
    pub fn invalidate(&self) {
        self.arena.invalidate_root();
    }

    /// Progress worth persisting. Only leaf and score criteria contribute.
    pub fn save_progress(&self) -> SavedProgress {
        let mut out = SavedProgress::new();
        self.arena.save(&mut out, self.hooks.clock.as_ref());
        out
    }

    /// Restore progress saved by [`save_progress`](Self::save_progress).
    ///
    /// The veto collaborator is not consulted. Keys that match no leaf or
    /// score criterion are handled according to
    /// [`ProgressOptions::unknown_keys`].
    pub fn load_progress(&mut self, saved: &SavedProgress) -> Result<()> {
        let unknown: Vec<&str> = {
            let known: HashSet<&str> = self.arena.persisted_keys();
            saved
                .keys()
                .map(String::as_str)
                .filter(|key| !known.contains(key))
                .collect()
        };
        if !unknown.is_empty() {
            match self.options.unknown_keys {
                UnknownKeyPolicy::Ignore => {}
                UnknownKeyPolicy::Warn => tracing::warn!(
                    "ignoring {} unknown progress keys for {} on {}: {}",
                    unknown.len(),
                    self.owner,
                    self.advancement.id(),
                    unknown.join(", ")
                ),
                UnknownKeyPolicy::Error => return Err(ProgressError::not_found(unknown[0])),
            }
        }

        let env = self.hooks.env(&self.owner);
        self.arena.load(saved, &env);
        tracing::debug!(
            "loaded {} progress entries for {} on {}",
            saved.len(),
            self.owner,
            self.advancement.id()
        );
        Ok(())
    }

    /// Full wire state of every leaf and score sub-identifier.
    pub fn fill_progress(&self, out: &mut WireProgress) {
        self.arena.fill(out, self.hooks.clock.as_ref());
    }

    /// Wire state that changed since the last flush, then flush.
    pub fn fill_dirty_sync(&mut self, out: &mut WireProgress) {
        self.arena.fill_dirty(out, self.hooks.clock.as_ref());
    }

    /// Treat the current state as already delivered to viewers.
    pub fn mark_synced(&mut self) {
        self.arena.mark_synced();
    }

    /// Detach every leaf from the trigger registry, for when the owner leaves.
    pub fn release_triggers(&mut self) {
        let env = self.hooks.env(&self.owner);
        self.arena.release_triggers(&env);
    }

    /// Snapshot of the saved progress, ready for a [`ProgressStore`].
    pub fn to_record(&self) -> ProgressRecord {
        ProgressRecord::new(
            self.owner.clone(),
            self.advancement.id(),
            self.save_progress(),
        )
    }

    /// Write the current progress to `store`.
    pub fn persist(&self, store: &dyn ProgressStore) -> Result<()> {
        store.put(&self.to_record())
    }

    /// Load progress from `store`. Returns whether a record was found.
    pub fn restore(&mut self, store: &dyn ProgressStore) -> Result<bool> {
        match store.get(&self.owner, self.advancement.id())? {
            Some(record) => {
                self.load_progress(&record.progress)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The shared criterion called `name`, if it is part of this tree.
    pub fn criterion(&self, name: &str) -> Option<&Arc<Criterion>> {
        self.arena
            .lookup(name)
            .map(|id| self.arena.node(id).criterion())
    }
}

impl Drop for AdvancementProgress {
    fn drop(&mut self) {
        self.release_triggers();
    }
}
