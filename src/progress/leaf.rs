//! Progress for atomic criteria.
//!
//! A leaf is either unachieved, in which case it is attached to the trigger
//! registry so gameplay can grant it, or achieved at a timestamp, in which
//! case it is detached so the trigger stops firing. Both transitions ask the
//! veto collaborator first.

use std::sync::Arc;

use crate::criterion::Criterion;
use crate::external::{from_millis, to_millis, Decision, Env, Timestamp};
use crate::progress::{wire_value, SavedProgress, WireProgress};

/// State of a leaf criterion.
#[derive(Debug)]
pub struct LeafProgress {
    criterion: Arc<Criterion>,
    achieved_at: Option<Timestamp>,
    trigger_attached: bool,
    /// Wire state changed since the last dirty flush.
    dirty: bool,
}

impl LeafProgress {
    pub(crate) fn new(criterion: Arc<Criterion>) -> Self {
        Self {
            criterion,
            achieved_at: None,
            trigger_attached: false,
            dirty: false,
        }
    }

    pub fn criterion(&self) -> &Arc<Criterion> {
        &self.criterion
    }

    pub fn get(&self) -> Option<Timestamp> {
        self.achieved_at
    }

    /// Whether the leaf is currently listening on the trigger registry.
    pub fn is_trigger_attached(&self) -> bool {
        self.trigger_attached
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn grant(&mut self, env: &Env<'_>, on_change: &mut dyn FnMut()) -> Option<Timestamp> {
        if let Some(at) = self.achieved_at {
            return Some(at);
        }

        let proposed = env.clock.now();
        let at = match env.veto.propose_grant(&self.criterion, env.owner, proposed) {
            Decision::Proceed(at) => at,
            Decision::Cancelled => {
                tracing::trace!("grant of {} for {} cancelled", self.criterion, env.owner);
                return None;
            }
        };

        self.achieved_at = Some(at);
        self.dirty = true;
        self.detach_trigger(env);
        tracing::debug!("granted {} to {} at {}", self.criterion, env.owner, at);
        on_change();
        Some(at)
    }

    /// Returns the timestamp in effect before the call, or `None` when
    /// nothing was achieved or the revoke was cancelled.
    pub(crate) fn revoke(&mut self, env: &Env<'_>, on_change: &mut dyn FnMut()) -> Option<Timestamp> {
        let previous = self.achieved_at?;

        if env
            .veto
            .propose_revoke(&self.criterion, env.owner)
            .is_cancelled()
        {
            tracing::trace!("revoke of {} for {} cancelled", self.criterion, env.owner);
            return None;
        }

        self.achieved_at = None;
        self.dirty = true;
        self.attach_trigger(env);
        tracing::debug!("revoked {} from {}", self.criterion, env.owner);
        on_change();
        Some(previous)
    }

    pub(crate) fn attach_trigger(&mut self, env: &Env<'_>) {
        if !self.trigger_attached {
            env.triggers.attach(env.owner, &self.criterion);
            self.trigger_attached = true;
        }
    }

    pub(crate) fn detach_trigger(&mut self, env: &Env<'_>) {
        if self.trigger_attached {
            env.triggers.detach(env.owner, &self.criterion);
            self.trigger_attached = false;
        }
    }

    pub(crate) fn save(&self, out: &mut SavedProgress) {
        if let Some(at) = self.achieved_at {
            out.insert(self.criterion.name().to_string(), to_millis(at));
        }
    }

    /// Restore from saved progress, bypassing the veto collaborator.
    pub(crate) fn load(&mut self, saved: &SavedProgress, env: &Env<'_>) {
        let restored = match saved.get(self.criterion.name()) {
            Some(&millis) => {
                let at = from_millis(millis);
                if at.is_none() {
                    tracing::warn!(
                        "ignoring out-of-range timestamp {} for {}",
                        millis,
                        self.criterion
                    );
                }
                at
            }
            None => None,
        };

        if restored != self.achieved_at {
            self.dirty = true;
        }
        self.achieved_at = restored;
        if restored.is_some() {
            self.detach_trigger(env);
        } else {
            self.attach_trigger(env);
        }
    }

    pub(crate) fn fill(&self, out: &mut WireProgress) {
        out.insert(self.criterion.name().to_string(), wire_value(self.achieved_at));
    }

    pub(crate) fn fill_dirty(&mut self, out: &mut WireProgress) {
        if self.dirty {
            self.fill(out);
            self.dirty = false;
        }
    }

    pub(crate) fn mark_synced(&mut self) {
        self.dirty = false;
    }
}
