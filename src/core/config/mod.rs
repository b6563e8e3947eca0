//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$PATCHWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/patchwork/config.toml`
//! 3. `~/.patchwork/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use patchwork::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! let options = config.patch_options();
//! println!("Staging suffix: {}", options.new_suffix);
//! println!("Recovery: {}", config.recovery());
//! ```

pub mod schema;

pub use schema::GlobalConfig;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::ops::{Patch, PatchError, PatchOptions, RecoveryPolicy};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "PATCHWORK_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config file: {0}")]
    EditError(#[from] PatchError),

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration.
///
/// Accessor methods fall back to the editor defaults for unset values.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Path to the config file (if loaded)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// holds invalid values. A missing config file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_global() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let global = Self::read_global_config(path)?;
        global.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(Self {
            global,
            path: Some(path.to_path_buf()),
        })
    }

    /// Locate the first existing config file.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $PATCHWORK_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/patchwork/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("patchwork/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.patchwork/config.toml
        let path = dirs::home_dir()?.join(".patchwork/config.toml");
        path.exists().then_some(path)
    }

    /// Read and parse a config file.
    fn read_global_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical write path for the config file.
    ///
    /// `$PATCHWORK_CONFIG` if set, otherwise `~/.patchwork/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".patchwork/config.toml"))
    }

    /// Write the global config to its canonical location.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        Self::write_to(&path, config)?;
        Ok(path)
    }

    /// Write a config file transactionally.
    ///
    /// The new content is staged next to the file and renamed into place, so
    /// a crash never leaves a half-written config behind.
    pub fn write_to(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        config.validate()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        // The editor needs an original to replace
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let mut patch = Patch::with_options(path, PatchOptions::default().without_backup())?;
        patch.write_text(&contents)?;
        patch.commit()?;

        debug!(path = %path.display(), "wrote config");
        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Build editor options from defaults and this config.
    pub fn patch_options(&self) -> PatchOptions {
        self.global.apply_to(PatchOptions::default())
    }

    /// Get the recovery policy.
    ///
    /// Defaults to `interrupted` if not configured.
    pub fn recovery(&self) -> RecoveryPolicy {
        self.global.recovery.unwrap_or_default()
    }

    /// Check if staging should be synced before commit.
    ///
    /// Defaults to `true` if not configured.
    pub fn sync(&self) -> bool {
        self.global.sync.unwrap_or(true)
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mode::OpenMode;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.patch_options(), PatchOptions::default());
        assert_eq!(config.recovery(), RecoveryPolicy::Interrupted);
        assert!(config.sync());
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
            backup_suffix = ".bak"
            read_mode = "rb"
            write_mode = "wb"
            sync = false
            "#,
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        let options = config.patch_options();

        assert_eq!(config.loaded_from(), Some(config_path.as_path()));
        assert_eq!(options.backup_suffix.as_deref(), Some(".bak"));
        assert_eq!(options.read_mode, OpenMode::READ_BINARY);
        assert!(!config.sync());
    }

    #[test]
    fn invalid_value_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "write_mode = \"r\"").unwrap();

        let result = Config::load_from(&config_path);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "new_suffix = \".new\"\nunknown_field = true").unwrap();

        let result = Config::load_from(&config_path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn write_creates_file_and_parents() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("nested/dir/config.toml");

        let config = GlobalConfig {
            recovery: Some(RecoveryPolicy::Always),
            ..Default::default()
        };
        Config::write_to(&config_path, &config).unwrap();

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded.recovery(), RecoveryPolicy::Always);
        assert!(!temp.path().join("nested/dir/config.toml.new").exists());
    }

    #[test]
    fn write_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "sync = false\nnew_suffix = \".x\"\n").unwrap();

        let config = GlobalConfig {
            sync: Some(true),
            ..Default::default()
        };
        Config::write_to(&config_path, &config).unwrap();

        let loaded = Config::load_from(&config_path).unwrap();
        assert!(loaded.sync());
        assert!(loaded.global.new_suffix.is_none());
    }
}
