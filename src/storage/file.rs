//! File-based progress storage.
//!
//! Records are stored as JSON files at `<dir>/<owner>/<advancement>.json`,
//! with both path components escaped so advancement identifiers such as
//! `story/mine_stone` map to a single file. Atomic writes are achieved via
//! temp file + rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{progress_dir, Config};
use crate::error::{FailOpen, ProgressError, Result};
use crate::storage::{ProgressRecord, ProgressStore};

/// File-based progress store.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    /// Create a store in the default directory.
    ///
    /// Uses `~/.advancements/progress/` or `$ADVANCEMENTS_HOME/progress/`.
    pub fn new() -> Result<Self> {
        let dir = progress_dir().ok_or_else(|| {
            ProgressError::config("Could not determine progress directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a store in the directory named by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.storage_dir() {
            Some(dir) => Self::with_dir(dir),
            None => Self::new(),
        }
    }

    /// Create a store in a custom directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| ProgressError::storage(&dir, e))?;
        }
        Ok(Self { dir })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn owner_dir(&self, owner: &str) -> PathBuf {
        self.dir.join(escape_component(owner))
    }

    fn record_path(&self, owner: &str, advancement: &str) -> PathBuf {
        self.owner_dir(owner)
            .join(format!("{}.json", escape_component(advancement)))
    }

    fn temp_path(&self, owner: &str, advancement: &str) -> PathBuf {
        self.owner_dir(owner)
            .join(format!(".{}.json.tmp", escape_component(advancement)))
    }

    fn atomic_write(&self, record: &ProgressRecord) -> Result<()> {
        let owner_dir = self.owner_dir(&record.owner);
        if !owner_dir.exists() {
            fs::create_dir_all(&owner_dir).map_err(|e| ProgressError::storage(&owner_dir, e))?;
        }

        let final_path = self.record_path(&record.owner, &record.advancement);
        let temp_path = self.temp_path(&record.owner, &record.advancement);
        let json = serde_json::to_string_pretty(record)?;

        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| ProgressError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| ProgressError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| ProgressError::storage(&temp_path, e))?;
        }

        fs::rename(&temp_path, &final_path).map_err(|e| ProgressError::storage(&final_path, e))?;
        Ok(())
    }
}

/// Escape a path component. Alphanumerics, `-`, `_` and non-leading `.` pass
/// through; every other byte becomes `%XX`. The empty string maps to `%`.
fn escape_component(raw: &str) -> String {
    if raw.is_empty() {
        return "%".to_string();
    }
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let safe = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if safe {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

impl ProgressStore for FileProgressStore {
    fn get(&self, owner: &str, advancement: &str) -> Result<Option<ProgressRecord>> {
        let path = self.record_path(owner, advancement);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| ProgressError::storage(&path, e))?;
        let record: ProgressRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    fn put(&self, record: &ProgressRecord) -> Result<()> {
        self.atomic_write(record)
    }

    fn list(&self, owner: &str) -> Result<Vec<ProgressRecord>> {
        let owner_dir = self.owner_dir(owner);
        if !owner_dir.exists() {
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&owner_dir).map_err(|e| ProgressError::storage(&owner_dir, e))?;
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ProgressError::storage(&owner_dir, e))?;
            let path = entry.path();

            // Skip non-JSON files and temp files
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            let record = fs::read_to_string(&path)
                .map_err(|e| ProgressError::storage(&path, e))
                .and_then(|content| Ok(serde_json::from_str::<ProgressRecord>(&content)?))
                .map(Some)
                .fail_open_with(&format!("skipping progress file {}", path.display()), None);
            if let Some(record) = record {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.advancement.cmp(&b.advancement));
        Ok(records)
    }

    fn delete(&self, owner: &str, advancement: &str) -> Result<()> {
        let path = self.record_path(owner, advancement);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| ProgressError::storage(&path, e))?;
        }

        let temp_path = self.temp_path(owner, advancement);
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }
        Ok(())
    }
}
