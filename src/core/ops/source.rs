//! core::ops::source
//!
//! Where an edit reads its original content from.
//!
//! A source is either a path the editor opens itself, or a handle the caller
//! already opened. The distinction is resolved once, in `Patch::begin`, into
//! an [`InputHandle`] that remembers whether the editor owns the handle.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::patch::PatchError;
use crate::core::mode::OpenMode;

/// The source of an edit.
#[derive(Debug)]
pub enum PatchSource {
    /// A path the editor opens with its configured read mode.
    Path(PathBuf),

    /// A handle the caller already opened.
    ///
    /// `path` names the file behind `file` and anchors the staging and backup
    /// paths. `mode` is the mode the handle was opened with; the staging mode
    /// is derived from it.
    Handle {
        /// The open handle.
        file: File,
        /// Path of the file behind the handle.
        path: PathBuf,
        /// Mode the handle was opened with.
        mode: OpenMode,
    },
}

impl PatchSource {
    /// Adopt a handle that was opened in text read mode.
    pub fn from_handle(file: File, path: impl Into<PathBuf>) -> Self {
        Self::from_handle_with_mode(file, path, OpenMode::READ)
    }

    /// Adopt a handle opened with an explicit mode.
    pub fn from_handle_with_mode(file: File, path: impl Into<PathBuf>, mode: OpenMode) -> Self {
        Self::Handle {
            file,
            path: path.into(),
            mode,
        }
    }

    /// Path of the file being edited.
    pub fn path(&self) -> &Path {
        match self {
            PatchSource::Path(path) => path,
            PatchSource::Handle { path, .. } => path,
        }
    }

    /// Check if this source is a caller-supplied handle.
    pub fn is_handle(&self) -> bool {
        matches!(self, PatchSource::Handle { .. })
    }

    /// Check that the source can be edited.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidArgument`] if the path is empty or a
    /// directory, or if a handle's mode does not allow reading.
    pub fn validate(&self) -> Result<(), PatchError> {
        let path = self.path();
        if path.as_os_str().is_empty() {
            return Err(PatchError::InvalidArgument(
                "source path must not be empty".to_string(),
            ));
        }

        match self {
            PatchSource::Path(_) => {
                if path.is_dir() {
                    return Err(PatchError::InvalidArgument(format!(
                        "source '{}' is a directory",
                        path.display()
                    )));
                }
            }
            PatchSource::Handle { mode, .. } => {
                if !mode.is_readable() {
                    return Err(PatchError::InvalidArgument(format!(
                        "source handle mode '{}' does not allow reading",
                        mode
                    )));
                }
            }
        }

        Ok(())
    }
}

impl From<PathBuf> for PatchSource {
    fn from(path: PathBuf) -> Self {
        PatchSource::Path(path)
    }
}

impl From<&PathBuf> for PatchSource {
    fn from(path: &PathBuf) -> Self {
        PatchSource::Path(path.clone())
    }
}

impl From<&Path> for PatchSource {
    fn from(path: &Path) -> Self {
        PatchSource::Path(path.to_path_buf())
    }
}

impl From<&str> for PatchSource {
    fn from(path: &str) -> Self {
        PatchSource::Path(PathBuf::from(path))
    }
}

impl From<String> for PatchSource {
    fn from(path: String) -> Self {
        PatchSource::Path(PathBuf::from(path))
    }
}

/// The open input of an active edit.
#[derive(Debug)]
pub(crate) enum InputHandle {
    /// Opened by the editor from a path.
    Owned(BufReader<File>),
    /// Supplied by the caller already open.
    Borrowed(BufReader<File>),
}

impl InputHandle {
    pub(crate) fn reader_mut(&mut self) -> &mut BufReader<File> {
        match self {
            InputHandle::Owned(reader) | InputHandle::Borrowed(reader) => reader,
        }
    }

    pub(crate) fn is_borrowed(&self) -> bool {
        matches!(self, InputHandle::Borrowed(_))
    }
}
