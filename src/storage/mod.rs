//! Progress storage.
//!
//! Persists the saved progress of each owner/advancement pair, with
//! file-based and in-memory backends.

pub mod file;
pub mod memory;
pub mod record;
pub mod traits;

pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;
pub use record::ProgressRecord;
pub use traits::ProgressStore;
