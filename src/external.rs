//! Collaborators that progress trees call out to.
//!
//! Three capabilities are injected into every `AdvancementProgress`:
//!
//! - [`Veto`]: gets a say before any grant, revoke or score change commits
//!   and may cancel it or adjust the timestamp.
//! - [`TriggerRegistry`]: leaf criteria attach while unachieved so gameplay
//!   events can grant them, and detach once achieved.
//! - [`Clock`]: the source of "now".
//!
//! All calls are synchronous. A cancellation is a normal outcome, not an
//! error.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::criterion::Criterion;

/// Moment a criterion became satisfied.
pub type Timestamp = DateTime<Utc>;

/// Convert a timestamp to the epoch-millis form used for persistence and sync.
pub fn to_millis(at: Timestamp) -> i64 {
    at.timestamp_millis()
}

/// Convert epoch millis back to a timestamp. `None` if out of range.
pub fn from_millis(millis: i64) -> Option<Timestamp> {
    DateTime::from_timestamp_millis(millis)
}

/// Verdict of a veto collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<T> {
    /// Go ahead, using the carried value.
    Proceed(T),
    /// Leave the state untouched.
    Cancelled,
}

impl<T> Decision<T> {
    /// The carried value, or `None` when cancelled.
    pub fn proceed(self) -> Option<T> {
        match self {
            Decision::Proceed(value) => Some(value),
            Decision::Cancelled => None,
        }
    }

    /// Whether the change was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Decision::Cancelled)
    }
}

/// Which goal boundary a score change crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTransition {
    /// The new score equals the goal.
    Reached,
    /// The old score equalled the goal.
    Left,
    /// Neither score is the goal.
    Intermediate,
}

impl ScoreTransition {
    /// Classify a change from `old` to `new` against `goal`.
    pub fn classify(old: u32, new: u32, goal: u32) -> Self {
        if new == goal {
            ScoreTransition::Reached
        } else if old == goal {
            ScoreTransition::Left
        } else {
            ScoreTransition::Intermediate
        }
    }
}

/// A proposed score change, handed to the veto collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreChange {
    pub old: u32,
    pub new: u32,
    pub goal: u32,
    pub transition: ScoreTransition,
    /// Timestamp the change would be recorded with if it reaches the goal.
    pub proposed: Timestamp,
}

/// Gatekeeper consulted before state changes commit.
///
/// Every method defaults to letting the change through unmodified.
///
/// A veto runs while the progress tree that consulted it is mutably
/// borrowed, so it cannot call back into that same tree. It may act on
/// other trees, including other advancements of the same owner.
pub trait Veto: Send + Sync {
    /// A leaf is about to be achieved at `proposed`.
    fn propose_grant(
        &self,
        _criterion: &Criterion,
        _owner: &str,
        proposed: Timestamp,
    ) -> Decision<Timestamp> {
        Decision::Proceed(proposed)
    }

    /// A leaf is about to be un-achieved.
    fn propose_revoke(&self, _criterion: &Criterion, _owner: &str) -> Decision<()> {
        Decision::Proceed(())
    }

    /// A score is about to change. The returned timestamp is recorded when
    /// the change reaches the goal.
    fn propose_score_change(
        &self,
        _criterion: &Criterion,
        _owner: &str,
        change: &ScoreChange,
    ) -> Decision<Timestamp> {
        Decision::Proceed(change.proposed)
    }
}

/// Veto that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Veto for AllowAll {}

/// Registry that fires grants for leaf criteria when gameplay events happen.
pub trait TriggerRegistry: Send + Sync {
    /// Start listening for `criterion` on behalf of `owner`.
    fn attach(&self, owner: &str, criterion: &Arc<Criterion>);

    /// Stop listening for `criterion` on behalf of `owner`.
    fn detach(&self, owner: &str, criterion: &Arc<Criterion>);
}

/// Registry that ignores every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTriggers;

impl TriggerRegistry for NoTriggers {
    fn attach(&self, _owner: &str, _criterion: &Arc<Criterion>) {}

    fn detach(&self, _owner: &str, _criterion: &Arc<Criterion>) {}
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock that only moves when told to. Useful for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `millis` since the epoch.
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Jump to `millis` since the epoch.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `millis`.
    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        from_millis(self.millis.load(Ordering::SeqCst)).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// The full set of collaborators for one progress tree.
#[derive(Clone)]
pub struct Collaborators {
    pub veto: Arc<dyn Veto>,
    pub triggers: Arc<dyn TriggerRegistry>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            veto: Arc::new(AllowAll),
            triggers: Arc::new(NoTriggers),
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Replace the veto collaborator.
    pub fn with_veto(mut self, veto: Arc<dyn Veto>) -> Self {
        self.veto = veto;
        self
    }

    /// Replace the trigger registry.
    pub fn with_triggers(mut self, triggers: Arc<dyn TriggerRegistry>) -> Self {
        self.triggers = triggers;
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bind the collaborators to an owner for one operation.
    pub(crate) fn env<'a>(&'a self, owner: &'a str) -> Env<'a> {
        Env {
            owner,
            veto: self.veto.as_ref(),
            triggers: self.triggers.as_ref(),
            clock: self.clock.as_ref(),
        }
    }
}

/// Borrowed collaborators plus the owner they act for.
#[derive(Clone, Copy)]
pub(crate) struct Env<'a> {
    pub owner: &'a str,
    pub veto: &'a dyn Veto,
    pub triggers: &'a dyn TriggerRegistry,
    pub clock: &'a dyn Clock,
}
