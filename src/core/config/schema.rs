//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$PATCHWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/patchwork/config.toml`
//! 3. `~/.patchwork/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., `read_mode` must open for reading).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::mode::OpenMode;
use crate::core::ops::{PatchOptions, RecoveryPolicy};

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// new_suffix = ".new"
/// backup_suffix = ".old"
/// read_mode = "r"
/// write_mode = "w"
/// recovery = "interrupted"
/// sync = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Staging file suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_suffix: Option<String>,

    /// Backup file suffix (empty disables backups)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_suffix: Option<String>,

    /// Mode for opening the original
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_mode: Option<OpenMode>,

    /// Mode for opening the staging file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_mode: Option<OpenMode>,

    /// When to restore a backup before editing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryPolicy>,

    /// Whether to fsync staging before commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<bool>,
}

impl GlobalConfig {
    /// Keys accepted by [`get`](GlobalConfig::get) and
    /// [`set`](GlobalConfig::set).
    pub const KEYS: &'static [&'static str] = &[
        "new_suffix",
        "backup_suffix",
        "read_mode",
        "write_mode",
        "recovery",
        "sync",
    ];

    /// Apply these settings on top of `base`.
    pub fn apply_to(&self, mut base: PatchOptions) -> PatchOptions {
        if let Some(suffix) = &self.new_suffix {
            base.new_suffix = suffix.clone();
        }
        if let Some(suffix) = &self.backup_suffix {
            base.backup_suffix = (!suffix.is_empty()).then(|| suffix.clone());
        }
        if let Some(mode) = self.read_mode {
            base.read_mode = mode;
        }
        if let Some(mode) = self.write_mode {
            base.write_mode = mode;
        }
        if let Some(policy) = self.recovery {
            base.recovery = policy;
        }
        if let Some(sync) = self.sync {
            base.sync = sync;
        }
        base
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.apply_to(PatchOptions::default())
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Get a value by key, formatted for display.
    ///
    /// Returns `Ok(None)` for a known key that is not set.
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match key {
            "new_suffix" => self.new_suffix.clone(),
            "backup_suffix" => self.backup_suffix.clone(),
            "read_mode" => self.read_mode.map(|m| m.to_string()),
            "write_mode" => self.write_mode.map(|m| m.to_string()),
            "recovery" => self.recovery.map(|p| p.to_string()),
            "sync" => self.sync.map(|s| s.to_string()),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Set a value by key, parsing it from a string.
    ///
    /// The result is validated as a whole, so a value that conflicts with
    /// another setting is rejected and `self` is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut next = self.clone();
        match key {
            "new_suffix" => next.new_suffix = Some(value.to_string()),
            "backup_suffix" => next.backup_suffix = Some(value.to_string()),
            "read_mode" => next.read_mode = Some(parse_mode(value)?),
            "write_mode" => next.write_mode = Some(parse_mode(value)?),
            "recovery" => {
                next.recovery = Some(value.parse().map_err(ConfigError::InvalidValue)?);
            }
            "sync" => {
                next.sync = Some(value.parse().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "invalid boolean '{}', must be true or false",
                        value
                    ))
                })?);
            }
            _ => return Err(unknown_key(key)),
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn parse_mode(value: &str) -> Result<OpenMode, ConfigError> {
    value
        .parse()
        .map_err(|e: crate::core::mode::ModeParseError| ConfigError::InvalidValue(e.to_string()))
}

fn unknown_key(key: &str) -> ConfigError {
    ConfigError::InvalidValue(format!(
        "unknown key '{}', must be one of: {}",
        key,
        GlobalConfig::KEYS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.new_suffix.is_none());
            assert!(config.recovery.is_none());
            assert_eq!(
                config.apply_to(PatchOptions::default()),
                PatchOptions::default()
            );
        }

        #[test]
        fn parse_full() {
            let config: GlobalConfig = toml::from_str(
                r#"
                new_suffix = ".tmp"
                backup_suffix = "~"
                read_mode = "rb"
                write_mode = "wb"
                recovery = "always"
                sync = false
                "#,
            )
            .unwrap();

            assert!(config.validate().is_ok());
            let options = config.apply_to(PatchOptions::default());
            assert_eq!(options.new_suffix, ".tmp");
            assert_eq!(options.backup_suffix.as_deref(), Some("~"));
            assert_eq!(options.read_mode, OpenMode::READ_BINARY);
            assert_eq!(options.recovery, RecoveryPolicy::Always);
            assert!(!options.sync);
        }

        #[test]
        fn empty_backup_suffix_disables_backup() {
            let config = GlobalConfig {
                backup_suffix: Some(String::new()),
                ..Default::default()
            };
            assert!(config
                .apply_to(PatchOptions::default())
                .backup_suffix
                .is_none());
        }

        #[test]
        fn conflicting_suffixes_invalid() {
            let config = GlobalConfig {
                new_suffix: Some(".old".to_string()),
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidValue(_))
            ));
        }

        #[test]
        fn bad_mode_rejected_at_parse() {
            let result: Result<GlobalConfig, _> = toml::from_str(r#"read_mode = "q""#);
            assert!(result.is_err());
        }

        #[test]
        fn reject_unknown_fields() {
            let result: Result<GlobalConfig, _> = toml::from_str("trunk = \"main\"");
            assert!(result.is_err());
        }

        #[test]
        fn roundtrip() {
            let config = GlobalConfig {
                new_suffix: Some(".staged".to_string()),
                backup_suffix: Some(".bak".to_string()),
                read_mode: Some(OpenMode::READ),
                write_mode: Some(OpenMode::WRITE_BINARY),
                recovery: Some(RecoveryPolicy::Interrupted),
                sync: Some(true),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: GlobalConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }
    }

    mod get_set {
        use super::*;

        #[test]
        fn set_then_get() {
            let mut config = GlobalConfig::default();
            config.set("recovery", "always").unwrap();
            config.set("sync", "false").unwrap();
            config.set("write_mode", "wb").unwrap();

            assert_eq!(config.get("recovery").unwrap().as_deref(), Some("always"));
            assert_eq!(config.get("sync").unwrap().as_deref(), Some("false"));
            assert_eq!(config.get("write_mode").unwrap().as_deref(), Some("wb"));
            assert_eq!(config.get("new_suffix").unwrap(), None);
        }

        #[test]
        fn unknown_key() {
            let mut config = GlobalConfig::default();
            assert!(config.get("trunk").is_err());
            assert!(config.set("trunk", "main").is_err());
        }

        #[test]
        fn invalid_value_leaves_config_unchanged() {
            let mut config = GlobalConfig::default();
            assert!(config.set("sync", "maybe").is_err());
            assert!(config.set("recovery", "sometimes").is_err());
            assert!(config.set("read_mode", "w").is_err());
            assert!(config.set("write_mode", "a").is_err());
            assert!(config.set("new_suffix", "").is_err());
            assert_eq!(config, GlobalConfig::default());
        }
    }
}
