//! In-memory progress storage.
//!
//! Thread-safe implementation of the ProgressStore trait, for tests and for
//! servers that persist elsewhere.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::storage::{ProgressRecord, ProgressStore};

/// In-memory progress store.
///
/// Records are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: RwLock<HashMap<(String, String), ProgressRecord>>,
}

impl MemoryProgressStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of records in the store.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Clear all records from the store.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }
}

fn key(owner: &str, advancement: &str) -> (String, String) {
    (owner.to_string(), advancement.to_string())
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, owner: &str, advancement: &str) -> Result<Option<ProgressRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.get(&key(owner, advancement)).cloned())
    }

    fn put(&self, record: &ProgressRecord) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.insert(key(&record.owner, &record.advancement), record.clone());
        Ok(())
    }

    fn list(&self, owner: &str) -> Result<Vec<ProgressRecord>> {
        let records = self.records.read().unwrap();
        let mut result: Vec<ProgressRecord> = records
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.advancement.cmp(&b.advancement));
        Ok(result)
    }

    fn delete(&self, owner: &str, advancement: &str) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.remove(&key(owner, advancement));
        Ok(())
    }
}
