//! Progress for counting criteria.
//!
//! A score criterion is achieved when its score reaches the goal. Every unit
//! of score maps to one sub-identifier, which is what viewers see, so the
//! node also tracks how far the wire state lags behind (`dirty_index`) to
//! emit only the sub-identifiers that changed.
//!
//! Only changes that reach or leave the goal report a state change to the
//! parent. Intermediate changes cannot alter ancestor satisfaction.

use std::sync::Arc;

use crate::criterion::{Criterion, CriterionKind};
use crate::error::{ProgressError, Result};
use crate::external::{
    from_millis, to_millis, Clock, Decision, Env, ScoreChange, ScoreTransition, Timestamp,
};
use crate::progress::{wire_value, SavedProgress, WireProgress};

/// State of a score criterion.
///
/// `current_score == goal` exactly when `achieved_at` is set.
#[derive(Debug)]
pub struct ScoreProgress {
    criterion: Arc<Criterion>,
    goal: u32,
    current_score: u32,
    achieved_at: Option<Timestamp>,
    /// Score last pushed to viewers.
    dirty_index: u32,
}

/// What a requested score change did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Unchanged,
    Cancelled,
    Committed,
}

impl ScoreProgress {
    /// Create a node at score zero. `None` unless `criterion` is a score.
    pub(crate) fn new(criterion: Arc<Criterion>) -> Option<Self> {
        let goal = criterion.goal()?;
        Some(Self {
            criterion,
            goal,
            current_score: 0,
            achieved_at: None,
            dirty_index: 0,
        })
    }

    pub fn criterion(&self) -> &Arc<Criterion> {
        &self.criterion
    }

    pub fn goal(&self) -> u32 {
        self.goal
    }

    pub fn current_score(&self) -> u32 {
        self.current_score
    }

    pub fn dirty_index(&self) -> u32 {
        self.dirty_index
    }

    pub fn get(&self) -> Option<Timestamp> {
        self.achieved_at
    }

    /// Sub-identifiers, one per unit of score.
    pub fn sub_ids(&self) -> &[String] {
        match self.criterion.kind() {
            CriterionKind::Score { sub_ids, .. } => sub_ids,
            _ => &[],
        }
    }

    /// Move the score to `score`.
    ///
    /// Returns the achieving timestamp after the call. A cancelled change
    /// leaves the node untouched.
    pub(crate) fn set_score(
        &mut self,
        env: &Env<'_>,
        score: i64,
        on_change: &mut dyn FnMut(),
    ) -> Result<Option<Timestamp>> {
        let score = u32::try_from(score)
            .ok()
            .filter(|s| *s <= self.goal)
            .ok_or_else(|| {
                ProgressError::invalid_argument(format!(
                    "score {} for '{}' is outside [0, {}]",
                    score, self.criterion, self.goal
                ))
            })?;
        self.apply(env, score, on_change);
        Ok(self.achieved_at)
    }

    pub(crate) fn grant(&mut self, env: &Env<'_>, on_change: &mut dyn FnMut()) -> Option<Timestamp> {
        self.apply(env, self.goal, on_change);
        self.achieved_at
    }

    /// Resets the score to zero. Returns the timestamp in effect before the
    /// call, or `None` if there was none or the change was cancelled.
    pub(crate) fn revoke(&mut self, env: &Env<'_>, on_change: &mut dyn FnMut()) -> Option<Timestamp> {
        let previous = self.achieved_at;
        match self.apply(env, 0, on_change) {
            Applied::Cancelled => None,
            Applied::Unchanged | Applied::Committed => previous,
        }
    }

    fn apply(&mut self, env: &Env<'_>, score: u32, on_change: &mut dyn FnMut()) -> Applied {
        if score == self.current_score {
            return Applied::Unchanged;
        }

        let change = ScoreChange {
            old: self.current_score,
            new: score,
            goal: self.goal,
            transition: ScoreTransition::classify(self.current_score, score, self.goal),
            proposed: env.clock.now(),
        };
        let at = match env
            .veto
            .propose_score_change(&self.criterion, env.owner, &change)
        {
            Decision::Proceed(at) => at,
            Decision::Cancelled => {
                tracing::trace!(
                    "score change {} -> {} of {} for {} cancelled",
                    change.old,
                    change.new,
                    self.criterion,
                    env.owner
                );
                return Applied::Cancelled;
            }
        };

        self.current_score = score;
        tracing::debug!(
            "score of {} for {}: {} -> {}",
            self.criterion,
            env.owner,
            change.old,
            change.new
        );
        match change.transition {
            ScoreTransition::Reached => {
                self.achieved_at = Some(at);
                on_change();
            }
            ScoreTransition::Left => {
                self.achieved_at = None;
                on_change();
            }
            ScoreTransition::Intermediate => {}
        }
        Applied::Committed
    }

    pub fn mark_synced(&mut self) {
        self.dirty_index = self.current_score;
    }

    /// Sub-identifiers whose wire state changed since the last sync.
    ///
    /// Newly completed ones carry the achieving timestamp, or a single "now"
    /// shared by the whole batch when the goal is not reached. Cleared ones
    /// carry `None`.
    pub fn dirty_delta(&self, clock: &dyn Clock) -> Vec<(String, Option<Timestamp>)> {
        let from = self.dirty_index as usize;
        let to = self.current_score as usize;
        let sub_ids = self.sub_ids();

        if from < to {
            let at = self.achieved_at.unwrap_or_else(|| clock.now());
            sub_ids[from..to]
                .iter()
                .map(|id| (id.clone(), Some(at)))
                .collect()
        } else if from > to {
            sub_ids[to.saturating_sub(1)..from]
                .iter()
                .map(|id| (id.clone(), None))
                .collect()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn save(&self, out: &mut SavedProgress, clock: &dyn Clock) {
        if self.current_score == 0 {
            return;
        }
        let at = self.achieved_at.unwrap_or_else(|| clock.now());
        for id in &self.sub_ids()[..self.current_score as usize] {
            out.insert(id.clone(), to_millis(at));
        }
        if let Some(at) = self.achieved_at {
            out.insert(self.criterion.name().to_string(), to_millis(at));
        }
    }

    /// Restore from saved progress, bypassing the veto collaborator.
    pub(crate) fn load(&mut self, saved: &SavedProgress) {
        if let Some(at) = saved
            .get(self.criterion.name())
            .and_then(|&millis| from_millis(millis))
        {
            self.current_score = self.goal;
            self.achieved_at = Some(at);
            return;
        }

        let found: Vec<Timestamp> = self
            .sub_ids()
            .iter()
            .filter_map(|id| saved.get(id).and_then(|&millis| from_millis(millis)))
            .collect();
        // Sub-identifiers are distinct, so the count never exceeds the goal.
        self.current_score = found.len() as u32;
        self.achieved_at = if self.current_score == self.goal {
            found.into_iter().max()
        } else {
            None
        };
    }

    pub(crate) fn fill(&self, out: &mut WireProgress, clock: &dyn Clock) {
        let completed = self.current_score as usize;
        let at = if completed > 0 {
            Some(self.achieved_at.unwrap_or_else(|| clock.now()))
        } else {
            None
        };
        for (i, id) in self.sub_ids().iter().enumerate() {
            let value = if i < completed { at } else { None };
            out.insert(id.clone(), wire_value(value));
        }
    }

    pub(crate) fn fill_dirty(&mut self, out: &mut WireProgress, clock: &dyn Clock) {
        for (id, at) in self.dirty_delta(clock) {
            out.insert(id, wire_value(at));
        }
        self.mark_synced();
    }
}
