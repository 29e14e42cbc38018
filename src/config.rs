//! Configuration loading.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.advancements/config.toml`)
//! 3. User config (`~/.advancements/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. Progress trees run with defaults when no
//! config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{FailOpen, ProgressError, Result};
use crate::progress::ProgressOptions;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Progress loading behavior.
    pub load: LoadConfig,
    /// Progress storage location.
    pub storage: StorageConfig,
}

/// What `load_progress` does with keys that match no criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeyPolicy {
    /// Drop them silently.
    Ignore,
    /// Drop them and log a warning.
    #[default]
    Warn,
    /// Reject the whole load.
    Error,
}

/// Valid values for the unknown-key policy.
pub const VALID_UNKNOWN_KEY_POLICIES: &[&str] = &["ignore", "warn", "error"];

impl FromStr for UnknownKeyPolicy {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ProgressError::config(format!(
                "unknown key policy '{}', expected one of {:?}",
                other, VALID_UNKNOWN_KEY_POLICIES
            ))),
        }
    }
}

/// Progress loading configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadConfig {
    /// Policy for saved keys naming no criterion of the tree.
    pub unknown_keys: UnknownKeyPolicy,
}

/// Progress storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file store. Defaults to `<home>/progress`.
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.advancements/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = advancements_home()?;
        Self::load_layer(&home.join("config.toml"))
    }

    /// Load project config from `.advancements/config.toml` in the given directory.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_layer(&cwd.join(".advancements").join("config.toml"))
    }

    /// A missing file is no layer; an unreadable one is reported and skipped.
    fn load_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        Self::load_from_file(path)
            .map(Some)
            .fail_open_default(&format!("loading config {}", path.display()))
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| ProgressError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| ProgressError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // ADVANCEMENTS_UNKNOWN_KEYS
        if let Ok(val) = env::var("ADVANCEMENTS_UNKNOWN_KEYS") {
            match val.parse::<UnknownKeyPolicy>() {
                Ok(policy) => self.load.unknown_keys = policy,
                Err(_) => eprintln!(
                    "Warning: Invalid ADVANCEMENTS_UNKNOWN_KEYS value '{}'. \
                    Valid values: {:?}. Using '{:?}'.",
                    val, VALID_UNKNOWN_KEY_POLICIES, self.load.unknown_keys
                ),
            }
        }

        // ADVANCEMENTS_STORAGE_DIR
        if let Ok(val) = env::var("ADVANCEMENTS_STORAGE_DIR") {
            if val.is_empty() {
                eprintln!("Warning: ADVANCEMENTS_STORAGE_DIR is empty. Ignoring.");
            } else {
                self.storage.dir = Some(PathBuf::from(val));
            }
        }
    }

    /// Merge another config into this one, field by field.
    ///
    /// Values in `other` that differ from the defaults win. A layer cannot
    /// reset a lower layer's value back to the default.
    fn merge(mut self, other: Config) -> Self {
        if other.load.unknown_keys != UnknownKeyPolicy::default() {
            self.load.unknown_keys = other.load.unknown_keys;
        }
        if other.storage.dir.is_some() {
            self.storage.dir = other.storage.dir;
        }
        self
    }

    /// Options for constructing progress trees.
    pub fn progress_options(&self) -> ProgressOptions {
        ProgressOptions {
            unknown_keys: self.load.unknown_keys,
        }
    }

    /// The configured storage directory, or the default under the home dir.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage.dir.clone().or_else(progress_dir)
    }
}

/// Get the advancements home directory.
///
/// Checks `ADVANCEMENTS_HOME` first, then falls back to `~/.advancements`.
/// An empty `ADVANCEMENTS_HOME` is ignored.
pub fn advancements_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("ADVANCEMENTS_HOME") {
        if home.is_empty() {
            tracing::warn!("ADVANCEMENTS_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("ADVANCEMENTS_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    dirs::home_dir().map(|home| home.join(".advancements"))
}

/// Get the default progress directory.
///
/// Returns `<advancements_home>/progress/`.
pub fn progress_dir() -> Option<PathBuf> {
    advancements_home().map(|h| h.join("progress"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        env::remove_var("ADVANCEMENTS_UNKNOWN_KEYS");
        env::remove_var("ADVANCEMENTS_STORAGE_DIR");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Warn);
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let toml_content = r#"
[load]
unknown_keys = "error"

[storage]
dir = "/var/lib/advancements"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Error);
        assert_eq!(
            config.storage.dir,
            Some(PathBuf::from("/var/lib/advancements"))
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[load]\nunknown_keys = \"ignore\"\n").unwrap();
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Ignore);
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn test_load_from_file_missing() {
        let result = Config::load_from_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ProgressError::Storage { .. })));
    }

    #[test]
    fn test_load_from_file_invalid_policy() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[load]\nunknown_keys = \"explode\"\n").unwrap();

        let result = Config::load_from_file(&config_path);
        assert!(matches!(result, Err(ProgressError::Config { .. })));
    }

    #[test]
    #[serial]
    fn test_project_config_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".advancements");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(
            project_dir.join("config.toml"),
            "[load]\nunknown_keys = \"ignore\"\n",
        )
        .unwrap();

        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Ignore);
    }

    #[test]
    #[serial]
    fn test_invalid_project_config_is_skipped() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".advancements");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join("config.toml"), "not valid toml [[[").unwrap();

        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Warn);
    }

    #[test]
    #[serial]
    fn test_user_config_under_home() {
        clear_env();
        let home = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "[load]\nunknown_keys = \"error\"\n",
        )
        .unwrap();
        env::set_var("ADVANCEMENTS_HOME", home.path());

        let config = Config::load_from_cwd(cwd.path());
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Error);

        env::remove_var("ADVANCEMENTS_HOME");
    }

    #[test]
    #[serial]
    fn test_env_var_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".advancements");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(
            project_dir.join("config.toml"),
            "[load]\nunknown_keys = \"ignore\"\n",
        )
        .unwrap();

        env::set_var("ADVANCEMENTS_UNKNOWN_KEYS", "error");
        env::set_var("ADVANCEMENTS_STORAGE_DIR", "/tmp/progress-override");

        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Error);
        assert_eq!(
            config.storage.dir,
            Some(PathBuf::from("/tmp/progress-override"))
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_invalid_values_ignored() {
        clear_env();
        let dir = TempDir::new().unwrap();
        env::set_var("ADVANCEMENTS_UNKNOWN_KEYS", "sometimes");
        env::set_var("ADVANCEMENTS_STORAGE_DIR", "");

        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.load.unknown_keys, UnknownKeyPolicy::Warn);
        assert!(config.storage.dir.is_none());

        clear_env();
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("ignore".parse::<UnknownKeyPolicy>().unwrap(), UnknownKeyPolicy::Ignore);
        assert_eq!("warn".parse::<UnknownKeyPolicy>().unwrap(), UnknownKeyPolicy::Warn);
        assert_eq!("error".parse::<UnknownKeyPolicy>().unwrap(), UnknownKeyPolicy::Error);
        assert!("Warn".parse::<UnknownKeyPolicy>().is_err());
    }

    #[test]
    fn test_merge_field_by_field() {
        let user = Config {
            load: LoadConfig {
                unknown_keys: UnknownKeyPolicy::Error,
            },
            storage: StorageConfig::default(),
        };
        let project = Config {
            load: LoadConfig::default(),
            storage: StorageConfig {
                dir: Some(PathBuf::from("/data")),
            },
        };

        let merged = Config::default().merge(user).merge(project);
        assert_eq!(merged.load.unknown_keys, UnknownKeyPolicy::Error);
        assert_eq!(merged.storage.dir, Some(PathBuf::from("/data")));
    }

    #[test]
    fn test_progress_options() {
        let mut config = Config::default();
        config.load.unknown_keys = UnknownKeyPolicy::Ignore;
        assert_eq!(
            config.progress_options().unknown_keys,
            UnknownKeyPolicy::Ignore
        );
    }

    #[test]
    fn test_storage_dir_prefers_configured() {
        let mut config = Config::default();
        config.storage.dir = Some(PathBuf::from("/data"));
        assert_eq!(config.storage_dir(), Some(PathBuf::from("/data")));
    }

    #[test]
    #[serial]
    fn test_advancements_home_with_env() {
        let dir = TempDir::new().unwrap();
        env::set_var("ADVANCEMENTS_HOME", dir.path());

        assert_eq!(advancements_home().unwrap(), dir.path());
        assert_eq!(progress_dir().unwrap(), dir.path().join("progress"));

        env::remove_var("ADVANCEMENTS_HOME");
    }

    #[test]
    #[serial]
    fn test_advancements_home_empty_env() {
        env::set_var("ADVANCEMENTS_HOME", "");

        let home = advancements_home();
        assert!(home.is_some());
        assert!(home.unwrap().ends_with(".advancements"));

        env::remove_var("ADVANCEMENTS_HOME");
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.load.unknown_keys = UnknownKeyPolicy::Ignore;
        config.storage.dir = Some(PathBuf::from("/data"));

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
