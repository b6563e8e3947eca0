//! core::ops::recovery
//!
//! Detecting and repairing interrupted commits.
//!
//! # Background
//!
//! A commit is two renames: `original → backup`, then `staging → original`.
//! A crash between them leaves no file at the original path, the pre-edit
//! content at the backup path, and the new content at the staging path.
//! Recovery renames the backup back onto the original.
//!
//! # Policies
//!
//! - [`RecoveryPolicy::Interrupted`] restores only when the original is
//!   missing, which is exactly the state a crash between the renames leaves.
//! - [`RecoveryPolicy::Always`] restores whenever a backup file exists. A
//!   successful commit also leaves a backup, so under this policy the next
//!   edit starts from the content *before* the previous commit, and a stray
//!   backup file silently replaces the current original.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::patch::PatchError;
use crate::core::paths::PatchPaths;

/// When `begin` restores a backup onto the original path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Restore only if the original path is missing.
    #[default]
    Interrupted,
    /// Restore whenever a backup file exists.
    ///
    /// For a path source the restore happens before the original is opened,
    /// so the edit reads the restored backup. This differs from restoring
    /// after opening, where the input would keep the replaced file's content
    /// while the original path already holds the backup. A handle source is
    /// open before the restore, so it reads whatever file it was opened on.
    Always,
}

impl RecoveryPolicy {
    /// Valid policy names.
    pub const NAMES: &'static [&'static str] = &["interrupted", "always"];

    /// Check whether this policy restores the backup for `paths`.
    ///
    /// Always false when backups are disabled or no backup file exists.
    pub fn applies(&self, paths: &PatchPaths) -> bool {
        let Some(backup) = paths.backup() else {
            return false;
        };
        if !backup.is_file() {
            return false;
        }

        match self {
            RecoveryPolicy::Always => true,
            RecoveryPolicy::Interrupted => is_missing(paths.original()),
        }
    }
}

impl fmt::Display for RecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryPolicy::Interrupted => write!(f, "interrupted"),
            RecoveryPolicy::Always => write!(f, "always"),
        }
    }
}

impl FromStr for RecoveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interrupted" => Ok(RecoveryPolicy::Interrupted),
            "always" => Ok(RecoveryPolicy::Always),
            other => Err(format!(
                "invalid recovery policy '{}', must be one of: {}",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Restore the backup onto the original path if `policy` applies.
///
/// Returns `true` if a backup was restored.
///
/// # Errors
///
/// Returns [`PatchError::Io`] if the rename fails.
pub fn recover_with(paths: &PatchPaths, policy: RecoveryPolicy) -> Result<bool, PatchError> {
    if !policy.applies(paths) {
        return Ok(false);
    }
    restore(paths)
}

/// Restore the backup onto the original path whenever one exists.
///
/// This is the explicit, unconditional repair behind `pw recover`.
pub fn recover(paths: &PatchPaths) -> Result<bool, PatchError> {
    recover_with(paths, RecoveryPolicy::Always)
}

fn restore(paths: &PatchPaths) -> Result<bool, PatchError> {
    let Some(backup) = paths.backup() else {
        return Ok(false);
    };

    fs::rename(backup, paths.original()).map_err(|source| PatchError::Io {
        action: "restore backup",
        path: backup.to_path_buf(),
        source,
    })?;

    debug!(
        original = %paths.original().display(),
        backup = %backup.display(),
        "restored backup onto original"
    );
    Ok(true)
}

fn is_missing(path: &Path) -> bool {
    matches!(fs::symlink_metadata(path), Err(e) if e.kind() == io::ErrorKind::NotFound)
}

/// What is on disk at one of an edit's paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileState {
    /// The path inspected.
    pub path: PathBuf,
    /// Whether a file exists there.
    pub exists: bool,
    /// Size in bytes, if it exists.
    pub size: Option<u64>,
}

impl FileState {
    fn probe(path: &Path) -> Result<Self, PatchError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Self {
                path: path.to_path_buf(),
                exists: true,
                size: Some(meta.len()),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self {
                path: path.to_path_buf(),
                exists: false,
                size: None,
            }),
            Err(source) => Err(PatchError::Io {
                action: "inspect",
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Classification of the files around an original path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    /// Only the original exists.
    Clean,
    /// The original and a backup from an earlier commit exist.
    Committed,
    /// A staging file exists next to the original.
    ///
    /// Either an edit is in progress or one was abandoned without rollback.
    StaleStaging,
    /// The original is missing but a backup exists.
    InterruptedCommit,
    /// Neither the original nor a backup exists.
    Missing,
}

impl EditState {
    /// Check whether recovery would change anything.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, EditState::InterruptedCommit)
    }
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditState::Clean => "clean",
            EditState::Committed => "committed (backup present)",
            EditState::StaleStaging => "staging file present",
            EditState::InterruptedCommit => "interrupted commit",
            EditState::Missing => "missing",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of all files belonging to an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditStatus {
    /// The original file.
    pub original: FileState,
    /// The staging file.
    pub staging: FileState,
    /// The backup file, if backups are enabled.
    pub backup: Option<FileState>,
    /// Overall classification.
    pub state: EditState,
}

/// Inspect the files belonging to `paths` without changing anything.
pub fn inspect(paths: &PatchPaths) -> Result<EditStatus, PatchError> {
    let original = FileState::probe(paths.original())?;
    let staging = FileState::probe(paths.staging())?;
    let backup = paths.backup().map(FileState::probe).transpose()?;

    let has_backup = backup.as_ref().is_some_and(|b| b.exists);
    let state = match (original.exists, staging.exists, has_backup) {
        (false, _, true) => EditState::InterruptedCommit,
        (false, _, false) => EditState::Missing,
        (true, true, _) => EditState::StaleStaging,
        (true, false, true) => EditState::Committed,
        (true, false, false) => EditState::Clean,
    };

    Ok(EditStatus {
        original,
        staging,
        backup,
        state,
    })
}
