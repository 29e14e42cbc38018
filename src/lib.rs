//! Advancements - per-player progress trees for advancement criteria
//!
//! An advancement is a tree of criteria: leaves granted by gameplay
//! triggers, scores counted toward a goal, always-achieved empties, and
//! And/Or combinators over them. [`AdvancementProgress`] tracks one player's
//! progress through one such tree, consults a [`Veto`] before every change,
//! and persists to a [`ProgressStore`].

pub mod cache;
pub mod config;
pub mod criterion;
pub mod error;
pub mod external;
pub mod progress;
pub mod storage;

pub use config::{Config, UnknownKeyPolicy};
pub use criterion::{Advancement, Criterion, CriterionKind};
pub use error::{FailOpen, ProgressError, Result};
pub use external::{
    AllowAll, Clock, Collaborators, Decision, ManualClock, NoTriggers, ScoreChange,
    ScoreTransition, SystemClock, Timestamp, TriggerRegistry, Veto,
};
pub use progress::{
    AdvancementProgress, NodeView, ProgressNode, ProgressOptions, SavedProgress, WireProgress,
    UNACHIEVED,
};
pub use storage::{FileProgressStore, MemoryProgressStore, ProgressRecord, ProgressStore};
