//! core::paths
//!
//! Centralized path routing for an edit.
//!
//! # Architecture
//!
//! Every edit touches up to three files. All of them are computed here so the
//! naming convention lives in exactly one place:
//!
//! - `<original>` - the file being edited
//! - `<original><new_suffix>` - the staging file receiving new content
//! - `<original><backup_suffix>` - the backup of the pre-edit content
//!
//! Suffixes are appended to the full file name, never substituted for the
//! extension, so `notes.txt` stages to `notes.txt.new`.
//!
//! **Hard rule:** No code may build a staging or backup path by hand. All
//! paths must go through `PatchPaths`.
//!
//! # Example
//!
//! ```
//! use patchwork::core::paths::PatchPaths;
//! use std::path::Path;
//!
//! let paths = PatchPaths::new("/etc/hosts", ".new", Some(".old"));
//!
//! assert_eq!(paths.staging(), Path::new("/etc/hosts.new"));
//! assert_eq!(paths.backup(), Some(Path::new("/etc/hosts.old")));
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default suffix for the staging file.
pub const DEFAULT_NEW_SUFFIX: &str = ".new";

/// Default suffix for the backup file.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".old";

/// The original, staging, and backup paths of one edit.
///
/// # Invariants
///
/// - `staging` is always `original + new_suffix`
/// - `backup` is `Some(original + backup_suffix)` only when backups are enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPaths {
    original: PathBuf,
    staging: PathBuf,
    backup: Option<PathBuf>,
}

impl PatchPaths {
    /// Derive all paths for `original`.
    ///
    /// A `None` or empty `backup_suffix` disables the backup path.
    pub fn new(
        original: impl Into<PathBuf>,
        new_suffix: &str,
        backup_suffix: Option<&str>,
    ) -> Self {
        let original = original.into();
        let staging = with_suffix(&original, new_suffix);
        let backup = backup_suffix
            .filter(|suffix| !suffix.is_empty())
            .map(|suffix| with_suffix(&original, suffix));

        Self {
            original,
            staging,
            backup,
        }
    }

    /// Derive paths with the default `.new` / `.old` suffixes.
    pub fn with_defaults(original: impl Into<PathBuf>) -> Self {
        Self::new(original, DEFAULT_NEW_SUFFIX, Some(DEFAULT_BACKUP_SUFFIX))
    }

    /// The file being edited.
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// The staging file.
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    /// The backup file, if backups are enabled.
    pub fn backup(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Check whether backups are enabled.
    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }
}

/// Append `suffix` to the last component of `path`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Resolve `path` against `cwd` unless it is already absolute.
pub fn resolve(cwd: Option<&Path>, path: &Path) -> PathBuf {
    match cwd {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}
