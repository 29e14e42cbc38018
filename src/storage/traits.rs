//! Progress storage traits.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::ProgressRecord;

/// Trait for progress storage backends.
///
/// Records are keyed by owner and advancement identifier.
pub trait ProgressStore: Send + Sync {
    /// Retrieve the record for `owner` on `advancement`.
    ///
    /// Returns `Ok(None)` if nothing was stored.
    fn get(&self, owner: &str, advancement: &str) -> Result<Option<ProgressRecord>>;

    /// Save a record, replacing any previous one for the same pair.
    fn put(&self, record: &ProgressRecord) -> Result<()>;

    /// Every record stored for `owner`, ordered by advancement identifier.
    fn list(&self, owner: &str) -> Result<Vec<ProgressRecord>>;

    /// Delete a record.
    ///
    /// Returns `Ok(())` even if the record doesn't exist.
    fn delete(&self, owner: &str, advancement: &str) -> Result<()>;

    /// Check if a record exists.
    fn exists(&self, owner: &str, advancement: &str) -> Result<bool> {
        Ok(self.get(owner, advancement)?.is_some())
    }
}

impl<T: ProgressStore + ?Sized> ProgressStore for Arc<T> {
    fn get(&self, owner: &str, advancement: &str) -> Result<Option<ProgressRecord>> {
        (**self).get(owner, advancement)
    }

    fn put(&self, record: &ProgressRecord) -> Result<()> {
        (**self).put(record)
    }

    fn list(&self, owner: &str) -> Result<Vec<ProgressRecord>> {
        (**self).list(owner)
    }

    fn delete(&self, owner: &str, advancement: &str) -> Result<()> {
        (**self).delete(owner, advancement)
    }
}
