//! Progress for criteria that are satisfied unconditionally.

use std::sync::Arc;

use crate::criterion::Criterion;
use crate::error::{ProgressError, Result};
use crate::external::Timestamp;

/// Always-achieved node. The timestamp is fixed once, when the tree is built.
#[derive(Debug)]
pub struct EmptyProgress {
    criterion: Arc<Criterion>,
    fixed_at: Option<Timestamp>,
}

impl EmptyProgress {
    pub(crate) fn new(criterion: Arc<Criterion>) -> Self {
        Self {
            criterion,
            fixed_at: None,
        }
    }

    pub fn criterion(&self) -> &Arc<Criterion> {
        &self.criterion
    }

    /// Fix the achieving timestamp. Only the first call succeeds.
    pub fn fix_timestamp(&mut self, at: Timestamp) -> Result<()> {
        if self.fixed_at.is_some() {
            return Err(ProgressError::illegal_state(format!(
                "empty criterion '{}' already has a fixed timestamp",
                self.criterion
            )));
        }
        self.fixed_at = Some(at);
        Ok(())
    }

    pub fn get(&self) -> Option<Timestamp> {
        self.fixed_at
    }

    /// Granting changes nothing; the node is already achieved.
    pub fn grant(&self) -> Option<Timestamp> {
        self.fixed_at
    }

    /// Always refused.
    pub fn revoke(&self) -> Option<Timestamp> {
        None
    }
}
