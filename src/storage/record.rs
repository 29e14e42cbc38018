//! Stored form of an owner's progress on one advancement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::SavedProgress;

/// Saved progress plus the keys it is stored under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    /// Owner (player) identifier.
    pub owner: String,
    /// Advancement identifier.
    pub advancement: String,
    /// When the record was taken.
    pub saved_at: DateTime<Utc>,
    /// Criterion names and score sub-identifiers to epoch millis.
    pub progress: SavedProgress,
}

impl ProgressRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        owner: impl Into<String>,
        advancement: impl Into<String>,
        progress: SavedProgress,
    ) -> Self {
        Self {
            owner: owner.into(),
            advancement: advancement.into(),
            saved_at: Utc::now(),
            progress,
        }
    }

    /// Whether nothing has been achieved yet.
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
    }
}
