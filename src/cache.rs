//! Memoized value cache.
//!
//! `Memo` holds a value that is expensive to derive and cheap to copy. Reads
//! go through `&self`, so derived values can be filled in lazily from
//! non-mutating accessors. The cell makes the owner `!Sync`, which matches the
//! single-writer-per-owner model of progress trees.

use std::cell::Cell;

/// A lazily computed, explicitly invalidated value.
#[derive(Debug, Clone, Default)]
pub struct Memo<T: Copy> {
    slot: Cell<Option<T>>,
}

impl<T: Copy> Memo<T> {
    /// Create an uncomputed memo.
    pub fn new() -> Self {
        Self {
            slot: Cell::new(None),
        }
    }

    /// Return the cached value, computing and storing it first if needed.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> T {
        if let Some(value) = self.slot.get() {
            return value;
        }
        let value = compute();
        self.slot.set(Some(value));
        value
    }

    /// The cached value, if one has been computed since the last invalidation.
    pub fn peek(&self) -> Option<T> {
        self.slot.get()
    }

    /// Drop the cached value.
    pub fn invalidate(&self) {
        self.slot.set(None);
    }

    /// Whether a value is currently cached.
    pub fn is_computed(&self) -> bool {
        self.slot.get().is_some()
    }
}
