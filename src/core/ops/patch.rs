//! core::ops::patch
//!
//! The transactional file editor.
//!
//! # Protocol
//!
//! 1. `begin` opens the original for reading, restores an interrupted
//!    commit's backup if the recovery policy says so, and creates the staging
//!    file.
//! 2. The caller reads from the original and writes the complete replacement
//!    content to staging, in any interleaving.
//! 3. `commit` closes both handles, renames `original → backup` (if backups
//!    are enabled) and then `staging → original`. The last rename is atomic on
//!    POSIX when staging and original share a filesystem, so readers of the
//!    original see either the old or the new content, never a mixture.
//!    `rollback` instead closes both handles and deletes staging.
//!
//! # Lifecycle
//!
//! ```text
//! Constructed --begin--> Open --commit---> Committed
//!                             --rollback-> RolledBack
//! ```
//!
//! Every other transition fails with [`PatchError::InvalidState`].
//!
//! # Invariants
//!
//! - At most one staging file exists per original path during an edit
//! - After `commit`, staging is gone and original holds exactly the staged bytes
//! - After `rollback`, staging is gone and original is byte-for-byte unchanged
//! - An edit that is still open when its `Patch` is dropped is rolled back
//!
//! # Example
//!
//! ```no_run
//! use patchwork::core::ops::patch::{edit, PatchOptions};
//!
//! edit("config.ini", PatchOptions::default(), |patch| {
//!     for line in patch.read_lines()? {
//!         patch.write_text(&line.replace("debug=0", "debug=1"))?;
//!     }
//!     Ok::<_, patchwork::core::ops::PatchError>(())
//! })?;
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::recovery::{self, RecoveryPolicy};
use super::source::{InputHandle, PatchSource};
use crate::core::mode::{Intent, ModeParseError, OpenMode};
use crate::core::paths::{PatchPaths, DEFAULT_BACKUP_SUFFIX, DEFAULT_NEW_SUFFIX};

/// Errors from editing operations.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The source or an option cannot be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A filesystem call failed.
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// The operation is not defined in the current lifecycle state.
    #[error("cannot {action}: edit is {state}")]
    InvalidState {
        action: &'static str,
        state: PatchState,
    },

    /// An open-mode string could not be parsed.
    #[error(transparent)]
    InvalidMode(#[from] ModeParseError),

    /// A text operation was attempted on a binary handle.
    #[error("cannot {action}: handle is open in binary mode")]
    ModeMismatch { action: &'static str },

    /// The caller closed the handle before the operation.
    #[error("{0} handle is closed")]
    Closed(&'static str),
}

/// Error from a scoped edit.
#[derive(Debug, Error)]
pub enum EditError<E> {
    /// The editor itself failed.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// The edit closure failed; the edit was rolled back.
    #[error("edit aborted: {0}")]
    Aborted(E),
}

impl<E> EditError<E> {
    /// The closure's error, if the edit was aborted by it.
    pub fn aborted(&self) -> Option<&E> {
        match self {
            EditError::Aborted(e) => Some(e),
            EditError::Patch(_) => None,
        }
    }

    /// Consume the error, returning the closure's error if there was one.
    pub fn into_aborted(self) -> Option<E> {
        match self {
            EditError::Aborted(e) => Some(e),
            EditError::Patch(_) => None,
        }
    }
}

/// Lifecycle state of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    /// Constructed but `begin` has not run.
    Constructed,
    /// Handles are open; reads and writes are allowed.
    Open,
    /// Staging was promoted to the original.
    Committed,
    /// Staging was discarded.
    RolledBack,
}

impl PatchState {
    /// Check if the edit has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self, PatchState::Committed | PatchState::RolledBack)
    }
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchState::Constructed => "not begun",
            PatchState::Open => "open",
            PatchState::Committed => "committed",
            PatchState::RolledBack => "rolled back",
        };
        write!(f, "{}", s)
    }
}

/// Options for an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOptions {
    /// Suffix appended to the original path to name the staging file.
    pub new_suffix: String,

    /// Suffix appended to the original path to name the backup file.
    ///
    /// `None` or an empty string disables backups and recovery.
    pub backup_suffix: Option<String>,

    /// Mode used to open a path source.
    pub read_mode: OpenMode,

    /// Mode used to open the staging file.
    ///
    /// Ignored for handle sources, whose staging mode is derived from the
    /// handle's own mode.
    pub write_mode: OpenMode,

    /// Run `begin` during construction.
    pub auto_begin: bool,

    /// When `begin` restores a backup onto the original.
    pub recovery: RecoveryPolicy,

    /// `fsync` the staging file before promoting it.
    pub sync: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            new_suffix: DEFAULT_NEW_SUFFIX.to_string(),
            backup_suffix: Some(DEFAULT_BACKUP_SUFFIX.to_string()),
            read_mode: OpenMode::READ,
            write_mode: OpenMode::WRITE,
            auto_begin: true,
            recovery: RecoveryPolicy::default(),
            sync: true,
        }
    }
}

impl PatchOptions {
    /// Disable backups.
    pub fn without_backup(mut self) -> Self {
        self.backup_suffix = None;
        self
    }

    /// Switch both modes to binary.
    pub fn binary(mut self) -> Self {
        self.read_mode = self.read_mode.binary(true);
        self.write_mode = self.write_mode.binary(true);
        self
    }

    /// Defer `begin` until it is called explicitly.
    pub fn deferred(mut self) -> Self {
        self.auto_begin = false;
        self
    }

    /// Derive the paths of an edit of `original` under these options.
    pub fn paths_for(&self, original: impl Into<PathBuf>) -> PatchPaths {
        PatchPaths::new(original, &self.new_suffix, self.backup_suffix.as_deref())
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidArgument`] if the staging suffix is empty
    /// or equal to the backup suffix, if `read_mode` does not have read
    /// intent, or if `write_mode` does not allow writing or would append to a
    /// leftover staging file.
    pub fn validate(&self) -> Result<(), PatchError> {
        if self.new_suffix.is_empty() {
            return Err(PatchError::InvalidArgument(
                "staging suffix must not be empty".to_string(),
            ));
        }

        if self.backup_suffix.as_deref() == Some(self.new_suffix.as_str()) {
            return Err(PatchError::InvalidArgument(format!(
                "staging and backup suffix must differ (both '{}')",
                self.new_suffix
            )));
        }

        if self.read_mode.intent() != Intent::Read {
            return Err(PatchError::InvalidArgument(format!(
                "read mode '{}' must open for reading without truncating",
                self.read_mode
            )));
        }

        if !self.write_mode.is_writable() {
            return Err(PatchError::InvalidArgument(format!(
                "write mode '{}' does not allow writing",
                self.write_mode
            )));
        }

        if self.write_mode.intent() == Intent::Append {
            return Err(PatchError::InvalidArgument(format!(
                "write mode '{}' would append to an existing staging file",
                self.write_mode
            )));
        }

        Ok(())
    }
}

/// A transactional edit of one file.
///
/// Construct with [`Patch::new`] or [`Patch::with_options`], then either
/// call [`commit`](Patch::commit) / [`rollback`](Patch::rollback) directly
/// or hand the edit to [`scope`](Patch::scope), which picks one based on the
/// closure's result.
///
/// Dropping a `Patch` whose edit is still open rolls it back.
#[derive(Debug)]
pub struct Patch {
    /// Source, until `begin` consumes it.
    source: Option<PatchSource>,
    /// Original, staging, and backup paths.
    paths: PatchPaths,
    /// Options the edit was constructed with.
    options: PatchOptions,
    /// Effective read mode.
    read_mode: OpenMode,
    /// Effective staging mode.
    write_mode: OpenMode,
    /// Open input, `None` before `begin` or after close.
    input: Option<InputHandle>,
    /// Open staging output, `None` before `begin` or after close.
    staging: Option<BufWriter<File>>,
    /// Lifecycle state.
    state: PatchState,
}

impl Patch {
    /// Start an edit of `source` with default options.
    ///
    /// # Errors
    ///
    /// See [`Patch::with_options`].
    pub fn new(source: impl Into<PatchSource>) -> Result<Self, PatchError> {
        Self::with_options(source, PatchOptions::default())
    }

    /// Start an edit of `source`.
    ///
    /// Runs [`begin`](Patch::begin) unless `options.auto_begin` is false.
    ///
    /// # Errors
    ///
    /// - [`PatchError::InvalidArgument`] if the source or options are invalid
    /// - Any error from `begin` when auto-beginning
    pub fn with_options(
        source: impl Into<PatchSource>,
        options: PatchOptions,
    ) -> Result<Self, PatchError> {
        let source = source.into();
        source.validate()?;
        options.validate()?;

        let paths = options.paths_for(source.path());
        let mut patch = Self {
            source: Some(source),
            paths,
            read_mode: options.read_mode,
            write_mode: options.write_mode,
            options,
            input: None,
            staging: None,
            state: PatchState::Constructed,
        };

        if patch.options.auto_begin {
            patch.begin()?;
        }
        Ok(patch)
    }

    /// Open the input and the staging file.
    ///
    /// For a path source, a pending backup is restored before the original is
    /// opened. For a handle source the handle is already open when recovery
    /// runs, and its mode, with read or append intent replaced by write
    /// intent, becomes the staging mode.
    ///
    /// The source is only consumed once both handles are open, so a failed
    /// `begin` leaves the edit `Constructed` and can be retried.
    ///
    /// # Errors
    ///
    /// - [`PatchError::InvalidState`] unless the edit was just constructed
    /// - [`PatchError::InvalidArgument`] if the source is no longer valid
    /// - [`PatchError::Io`] if recovery or opening fails
    pub fn begin(&mut self) -> Result<(), PatchError> {
        if self.state != PatchState::Constructed {
            return Err(PatchError::InvalidState {
                action: "begin",
                state: self.state,
            });
        }

        let source = self.source.as_ref().ok_or(PatchError::InvalidState {
            action: "begin",
            state: self.state,
        })?;
        source.validate()?;

        let (opened, read_mode, write_mode) = match source {
            PatchSource::Path(path) => {
                self.recover_pending()?;
                let file = self
                    .options
                    .read_mode
                    .to_open_options()
                    .open(path)
                    .map_err(io_error("open", path))?;
                (Some(file), self.options.read_mode, self.options.write_mode)
            }
            PatchSource::Handle { mode, .. } => {
                let mode = *mode;
                self.recover_pending()?;
                (None, mode, mode.with_write_intent())
            }
        };

        let staging_path = self.paths.staging();
        let staging = write_mode
            .to_open_options()
            .open(staging_path)
            .map_err(io_error("create staging file", staging_path))?;

        let input = match (opened, self.source.take()) {
            (Some(file), _) => InputHandle::Owned(BufReader::new(file)),
            (None, Some(PatchSource::Handle { file, .. })) => {
                InputHandle::Borrowed(BufReader::new(file))
            }
            (None, _) => {
                return Err(PatchError::InvalidArgument(
                    "handle source is no longer available".to_string(),
                ))
            }
        };

        debug!(
            original = %self.paths.original().display(),
            staging = %staging_path.display(),
            borrowed = input.is_borrowed(),
            "began edit"
        );

        self.input = Some(input);
        self.staging = Some(BufWriter::new(staging));
        self.read_mode = read_mode;
        self.write_mode = write_mode;
        self.state = PatchState::Open;
        Ok(())
    }

    fn recover_pending(&self) -> Result<(), PatchError> {
        if recovery::recover_with(&self.paths, self.options.recovery)? {
            debug!(
                original = %self.paths.original().display(),
                policy = %self.options.recovery,
                "recovered backup before edit"
            );
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> PatchState {
        self.state
    }

    /// Paths touched by this edit.
    pub fn paths(&self) -> &PatchPaths {
        &self.paths
    }

    /// The file being edited.
    pub fn original(&self) -> &Path {
        self.paths.original()
    }

    /// Options the edit was constructed with.
    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Effective read mode.
    pub fn read_mode(&self) -> OpenMode {
        self.read_mode
    }

    /// Effective staging mode.
    pub fn write_mode(&self) -> OpenMode {
        self.write_mode
    }

    /// Check if the input handle was supplied by the caller.
    pub fn is_borrowed(&self) -> bool {
        self.input.as_ref().is_some_and(InputHandle::is_borrowed)
    }

    // =========================================================================
    // Read passthroughs
    // =========================================================================

    fn input_mut(&mut self, action: &'static str) -> Result<&mut BufReader<File>, PatchError> {
        self.ensure_open(action)?;
        self.input
            .as_mut()
            .map(InputHandle::reader_mut)
            .ok_or(PatchError::Closed("input"))
    }

    fn require_text(mode: OpenMode, action: &'static str) -> Result<(), PatchError> {
        if mode.is_binary() {
            return Err(PatchError::ModeMismatch { action });
        }
        Ok(())
    }

    /// Read text from the original.
    ///
    /// With `None`, reads everything that is left. With `Some(n)`, reads at
    /// most `n` characters. An empty string means end of file.
    pub fn read_text(&mut self, limit: Option<usize>) -> Result<String, PatchError> {
        Self::require_text(self.read_mode, "read text")?;
        let original = self.paths.original().to_path_buf();
        let reader = self.input_mut("read")?;

        let result = match limit {
            None => {
                let mut text = String::new();
                reader.read_to_string(&mut text).map(|_| text)
            }
            Some(n) => read_chars(reader, n),
        };
        result.map_err(io_error("read", &original))
    }

    /// Read bytes from the original.
    ///
    /// With `None`, reads everything that is left. With `Some(n)`, reads at
    /// most `n` bytes.
    pub fn read_bytes(&mut self, limit: Option<usize>) -> Result<Vec<u8>, PatchError> {
        let original = self.paths.original().to_path_buf();
        let reader = self.input_mut("read")?;

        let mut buf = Vec::new();
        let result = match limit {
            None => reader.read_to_end(&mut buf),
            Some(n) => reader.by_ref().take(n as u64).read_to_end(&mut buf),
        };
        result.map_err(io_error("read", &original))?;
        Ok(buf)
    }

    /// Read the next line, including its terminator.
    ///
    /// Returns `None` at end of file.
    pub fn next_line(&mut self) -> Result<Option<String>, PatchError> {
        Self::require_text(self.read_mode, "read a line")?;
        let original = self.paths.original().to_path_buf();
        let reader = self.input_mut("read a line")?;

        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .map_err(io_error("read", &original))?;
        Ok((n > 0).then_some(line))
    }

    /// Read all remaining lines, each including its terminator.
    pub fn read_lines(&mut self) -> Result<Vec<String>, PatchError> {
        self.iter_lines().collect()
    }

    /// Iterate over the remaining lines.
    ///
    /// `for line in &mut patch` does the same. [`BufRead::lines`] would
    /// consume the editor instead.
    pub fn iter_lines(&mut self) -> Lines<'_> {
        Lines { patch: self }
    }

    // =========================================================================
    // Write passthroughs
    // =========================================================================

    fn staging_mut(&mut self, action: &'static str) -> Result<&mut BufWriter<File>, PatchError> {
        self.ensure_open(action)?;
        self.staging.as_mut().ok_or(PatchError::Closed("staging"))
    }

    /// Append text to the staging file.
    ///
    /// Returns the number of bytes written.
    pub fn write_text(&mut self, data: &str) -> Result<usize, PatchError> {
        Self::require_text(self.write_mode, "write text")?;
        self.write_bytes(data.as_bytes())
    }

    /// Append bytes to the staging file.
    ///
    /// Returns the number of bytes written.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PatchError> {
        let staging_path = self.paths.staging().to_path_buf();
        self.staging_mut("write")?
            .write_all(data)
            .map_err(io_error("write", &staging_path))?;
        Ok(data.len())
    }

    /// Append each line to the staging file, in order.
    ///
    /// No terminators are added.
    pub fn write_lines<I, S>(&mut self, lines: I) -> Result<(), PatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.write_text(line.as_ref())?;
        }
        Ok(())
    }

    // =========================================================================
    // Closing
    // =========================================================================

    /// Close the input handle early.
    ///
    /// Further reads fail with [`PatchError::Closed`]; commit and rollback
    /// are unaffected.
    pub fn close_input(&mut self) {
        self.input = None;
    }

    /// Flush and close the staging handle early.
    ///
    /// Further writes fail with [`PatchError::Closed`]; commit and rollback
    /// are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Io`] if buffered data cannot be flushed.
    pub fn close_staging(&mut self) -> Result<(), PatchError> {
        self.finish_staging()
    }

    /// Flush and close staging, keeping its content.
    ///
    /// A handle that is already closed is skipped. A failed `fsync` is logged
    /// and swallowed; a failed flush is not, since the staged bytes would be
    /// incomplete.
    fn finish_staging(&mut self) -> Result<(), PatchError> {
        let Some(writer) = self.staging.take() else {
            return Ok(());
        };

        let staging_path = self.paths.staging();
        let file = writer.into_inner().map_err(|e| PatchError::Io {
            action: "flush",
            path: staging_path.to_path_buf(),
            source: e.into_error(),
        })?;

        if self.options.sync {
            if let Err(e) = file.sync_all() {
                warn!(
                    staging = %staging_path.display(),
                    error = %e,
                    "failed to sync staging file, continuing"
                );
            }
        }
        Ok(())
    }

    /// Close staging without flushing buffered data.
    fn discard_staging(&mut self) {
        if let Some(writer) = self.staging.take() {
            let (_file, _unflushed) = writer.into_parts();
        }
    }

    // =========================================================================
    // Commit / rollback
    // =========================================================================

    fn ensure_open(&self, action: &'static str) -> Result<(), PatchError> {
        if self.state != PatchState::Open {
            return Err(PatchError::InvalidState {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Promote the staging file to the original.
    ///
    /// Closes both handles (already-closed handles are fine), moves the
    /// original to the backup path if backups are enabled, then atomically
    /// renames staging onto the original. If the second rename fails, the
    /// backup is moved back before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`PatchError::InvalidState`] unless the edit is open
    /// - [`PatchError::Io`] if flushing or a rename fails; the edit stays
    ///   open so it can still be rolled back
    pub fn commit(&mut self) -> Result<(), PatchError> {
        self.ensure_open("commit")?;

        self.close_input();
        self.finish_staging()?;

        let original = self.paths.original();
        let staging = self.paths.staging();

        if let Some(backup) = self.paths.backup() {
            fs::rename(original, backup).map_err(io_error("back up", original))?;
        }

        if let Err(source) = fs::rename(staging, original) {
            if let Some(backup) = self.paths.backup() {
                if let Err(e) = fs::rename(backup, original) {
                    warn!(
                        original = %original.display(),
                        backup = %backup.display(),
                        error = %e,
                        "failed to restore backup after failed commit"
                    );
                }
            }
            return Err(PatchError::Io {
                action: "promote staging file",
                path: staging.to_path_buf(),
                source,
            });
        }

        debug!(
            original = %original.display(),
            backup = ?self.paths.backup().map(Path::display),
            "committed edit"
        );
        self.state = PatchState::Committed;
        Ok(())
    }

    /// Alias for [`commit`](Patch::commit).
    pub fn close(&mut self) -> Result<(), PatchError> {
        self.commit()
    }

    /// Discard the staging file, leaving the original untouched.
    ///
    /// No backup is created or consumed.
    ///
    /// # Errors
    ///
    /// - [`PatchError::InvalidState`] unless the edit is open
    /// - [`PatchError::Io`] if the staging file cannot be removed
    pub fn rollback(&mut self) -> Result<(), PatchError> {
        self.ensure_open("roll back")?;

        self.close_input();
        self.discard_staging();

        let staging = self.paths.staging();
        fs::remove_file(staging).map_err(io_error("remove staging file", staging))?;

        debug!(original = %self.paths.original().display(), "rolled back edit");
        self.state = PatchState::RolledBack;
        Ok(())
    }

    /// Run `f` against this edit, then commit or roll back.
    ///
    /// Begins the edit first if it was constructed with `auto_begin` off.
    /// On `Ok` the edit is committed; on `Err` it is rolled back and the
    /// closure's error is returned as [`EditError::Aborted`]. If `f` already
    /// committed or rolled back, that outcome stands.
    ///
    /// A panic inside `f` drops the `Patch`, which rolls the edit back.
    pub fn scope<T, E, F>(mut self, f: F) -> Result<T, EditError<E>>
    where
        F: FnOnce(&mut Patch) -> Result<T, E>,
    {
        if self.state == PatchState::Constructed {
            self.begin()?;
        }

        match f(&mut self) {
            Ok(value) => {
                if self.state == PatchState::Open {
                    self.commit()?;
                }
                Ok(value)
            }
            Err(err) => {
                if self.state == PatchState::Open {
                    if let Err(e) = self.rollback() {
                        warn!(
                            original = %self.paths.original().display(),
                            error = %e,
                            "rollback after aborted edit failed"
                        );
                    }
                }
                Err(EditError::Aborted(err))
            }
        }
    }
}

impl Drop for Patch {
    fn drop(&mut self) {
        if self.state == PatchState::Open {
            if let Err(e) = self.rollback() {
                warn!(
                    original = %self.paths.original().display(),
                    error = %e,
                    "rollback of dropped edit failed"
                );
            }
        }
    }
}

/// Edit `source` inside a scope.
///
/// Shorthand for `Patch::with_options(source, options)?.scope(f)`.
pub fn edit<T, E, F>(
    source: impl Into<PatchSource>,
    options: PatchOptions,
    f: F,
) -> Result<T, EditError<E>>
where
    F: FnOnce(&mut Patch) -> Result<T, E>,
{
    Patch::with_options(source, options)?.scope(f)
}

/// Iterator over the remaining lines of an edit's input.
#[derive(Debug)]
pub struct Lines<'a> {
    patch: &'a mut Patch,
}

impl Iterator for Lines<'_> {
    type Item = Result<String, PatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.patch.next_line().transpose()
    }
}

impl<'a> IntoIterator for &'a mut Patch {
    type Item = Result<String, PatchError>;
    type IntoIter = Lines<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_lines()
    }
}

impl Read for Patch {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input_mut("read").map_err(into_io)?.read(buf)
    }
}

impl BufRead for Patch {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.input_mut("read").map_err(into_io)?.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if let Some(input) = self.input.as_mut() {
            input.reader_mut().consume(amt);
        }
    }
}

impl Write for Patch {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staging_mut("write").map_err(into_io)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staging_mut("flush").map_err(into_io)?.flush()
    }
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> PatchError {
    let path = path.to_path_buf();
    move |source| PatchError::Io {
        action,
        path,
        source,
    }
}

fn into_io(err: PatchError) -> io::Error {
    match err {
        PatchError::Io { source, .. } => source,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

/// Read at most `n` UTF-8 characters.
fn read_chars<R: BufRead>(reader: &mut R, n: usize) -> io::Result<String> {
    let mut bytes = Vec::new();
    let mut count = 0;

    'fill: loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            break;
        }

        let mut used = 0;
        let mut done = false;
        for &b in available {
            // Continuation bytes (0b10xx_xxxx) belong to the current char.
            if b & 0xC0 != 0x80 {
                if count == n {
                    done = true;
                    break;
                }
                count += 1;
            }
            used += 1;
        }

        bytes.extend_from_slice(&available[..used]);
        reader.consume(used);
        if done {
            break 'fill;
        }
    }

    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONTENT: &str = "line1\nline2\nline3\n";

    struct Fixture {
        _temp: TempDir,
        path: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_content(CONTENT)
        }

        fn with_content(content: &str) -> Self {
            let temp = TempDir::new().expect("create temp dir");
            let path = temp.path().join("test.txt");
            fs::write(&path, content).expect("write test file");
            Self { _temp: temp, path }
        }

        fn paths(&self) -> PatchPaths {
            PatchPaths::with_defaults(&self.path)
        }

        fn read(&self) -> String {
            fs::read_to_string(&self.path).expect("read original")
        }
    }

    mod options {
        use super::*;

        #[test]
        fn defaults() {
            let options = PatchOptions::default();
            assert_eq!(options.new_suffix, ".new");
            assert_eq!(options.backup_suffix.as_deref(), Some(".old"));
            assert_eq!(options.read_mode, OpenMode::READ);
            assert_eq!(options.write_mode, OpenMode::WRITE);
            assert!(options.auto_begin);
            assert!(options.sync);
            assert!(options.validate().is_ok());
        }

        #[test]
        fn empty_new_suffix_rejected() {
            let options = PatchOptions {
                new_suffix: String::new(),
                ..Default::default()
            };
            assert!(matches!(
                options.validate(),
                Err(PatchError::InvalidArgument(_))
            ));
        }

        #[test]
        fn equal_suffixes_rejected() {
            let options = PatchOptions {
                new_suffix: ".bak".to_string(),
                backup_suffix: Some(".bak".to_string()),
                ..Default::default()
            };
            assert!(options.validate().is_err());
        }

        #[test]
        fn truncating_read_mode_rejected() {
            let options = PatchOptions {
                read_mode: "w+".parse().unwrap(),
                ..Default::default()
            };
            assert!(options.validate().is_err());
        }

        #[test]
        fn read_only_write_mode_rejected() {
            let options = PatchOptions {
                write_mode: OpenMode::READ,
                ..Default::default()
            };
            assert!(options.validate().is_err());
        }

        #[test]
        fn append_write_mode_rejected() {
            for mode in ["a", "a+", "ab"] {
                let options = PatchOptions {
                    write_mode: mode.parse().unwrap(),
                    ..Default::default()
                };
                let err = options.validate().unwrap_err();
                assert!(matches!(err, PatchError::InvalidArgument(_)), "{}", mode);
            }
        }

        #[test]
        fn binary_switches_both_modes() {
            let options = PatchOptions::default().binary();
            assert_eq!(options.read_mode, OpenMode::READ_BINARY);
            assert_eq!(options.write_mode, OpenMode::WRITE_BINARY);
        }

        #[test]
        fn without_backup_clears_suffix() {
            let options = PatchOptions::default().without_backup();
            assert!(options.backup_suffix.is_none());
            assert!(!options.paths_for("x").has_backup());
        }
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn auto_begin_opens() {
            let fx = Fixture::new();
            let patch = Patch::new(&fx.path).unwrap();
            assert_eq!(patch.state(), PatchState::Open);
            assert!(fx.paths().staging().exists());
        }

        #[test]
        fn deferred_begin() {
            let fx = Fixture::new();
            let mut patch =
                Patch::with_options(&fx.path, PatchOptions::default().deferred()).unwrap();
            assert_eq!(patch.state(), PatchState::Constructed);
            assert!(!fx.paths().staging().exists());

            patch.begin().unwrap();
            assert_eq!(patch.state(), PatchState::Open);
        }

        #[test]
        fn begin_twice_fails() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            let err = patch.begin().unwrap_err();
            assert!(matches!(
                err,
                PatchError::InvalidState {
                    state: PatchState::Open,
                    ..
                }
            ));
        }

        #[test]
        fn commit_before_begin_fails() {
            let fx = Fixture::new();
            let mut patch =
                Patch::with_options(&fx.path, PatchOptions::default().deferred()).unwrap();
            assert!(matches!(
                patch.commit(),
                Err(PatchError::InvalidState { .. })
            ));
        }

        #[test]
        fn commit_twice_fails() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.commit().unwrap();
            assert!(patch.state().is_finished());

            let err = patch.commit().unwrap_err();
            assert!(err.to_string().contains("committed"));
        }

        #[test]
        fn rollback_after_commit_fails() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.commit().unwrap();
            assert!(matches!(
                patch.rollback(),
                Err(PatchError::InvalidState {
                    state: PatchState::Committed,
                    ..
                })
            ));
        }

        #[test]
        fn begin_after_rollback_fails() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.rollback().unwrap();
            assert!(matches!(
                patch.begin(),
                Err(PatchError::InvalidState {
                    state: PatchState::RolledBack,
                    ..
                })
            ));
        }

        #[test]
        fn io_after_finish_fails() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.rollback().unwrap();
            assert!(patch.read_text(None).is_err());
            assert!(patch.write_text("x").is_err());
        }

        #[test]
        fn missing_file_fails_to_begin() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("absent.txt");
            let err = Patch::new(&path).unwrap_err();
            assert!(matches!(err, PatchError::Io { action: "open", .. }));
            assert!(!temp.path().join("absent.txt.new").exists());
        }

        #[test]
        fn drop_rolls_back_open_edit() {
            let fx = Fixture::new();
            {
                let mut patch = Patch::new(&fx.path).unwrap();
                patch.write_text("discarded\n").unwrap();
            }
            assert_eq!(fx.read(), CONTENT);
            assert!(!fx.paths().staging().exists());
        }

        #[test]
        fn close_is_commit() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.write_text("new\n").unwrap();
            patch.close().unwrap();
            assert_eq!(patch.state(), PatchState::Committed);
            assert_eq!(fx.read(), "new\n");
        }
    }

    mod reads {
        use super::*;

        #[test]
        fn read_line_then_rest() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            assert_eq!(patch.next_line().unwrap().as_deref(), Some("line1\n"));
            assert_eq!(patch.read_text(None).unwrap(), "line2\nline3\n");
            assert_eq!(patch.next_line().unwrap(), None);
        }

        #[test]
        fn read_lines_keeps_terminators() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            assert_eq!(
                patch.read_lines().unwrap(),
                vec!["line1\n", "line2\n", "line3\n"]
            );
        }

        #[test]
        fn iteration_yields_lines() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            for (idx, line) in (&mut patch).into_iter().enumerate() {
                assert_eq!(line.unwrap(), format!("line{}\n", idx + 1));
            }
        }

        #[test]
        fn read_counts_characters() {
            let fx = Fixture::with_content("héllo wörld");
            let mut patch = Patch::new(&fx.path).unwrap();
            assert_eq!(patch.read_text(Some(2)).unwrap(), "hé");
            assert_eq!(patch.read_text(Some(0)).unwrap(), "");
            assert_eq!(patch.read_text(Some(100)).unwrap(), "llo wörld");
            assert_eq!(patch.read_text(Some(1)).unwrap(), "");
        }

        #[test]
        fn read_bytes_limit() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            assert_eq!(patch.read_bytes(Some(3)).unwrap(), b"lin");
            assert_eq!(patch.read_bytes(None).unwrap(), b"e1\nline2\nline3\n");
        }

        #[test]
        fn text_reads_rejected_in_binary_mode() {
            let fx = Fixture::new();
            let mut patch = Patch::with_options(&fx.path, PatchOptions::default().binary()).unwrap();
            assert!(matches!(
                patch.next_line(),
                Err(PatchError::ModeMismatch { .. })
            ));
            assert_eq!(patch.read_bytes(None).unwrap(), CONTENT.as_bytes());
        }

        #[test]
        fn invalid_utf8_is_an_io_error() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("bin");
            fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();

            let mut patch = Patch::new(&path).unwrap();
            assert!(matches!(
                patch.read_text(None),
                Err(PatchError::Io { action: "read", .. })
            ));
        }

        #[test]
        fn read_after_close_input() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.close_input();
            assert!(matches!(
                patch.read_text(None),
                Err(PatchError::Closed("input"))
            ));
        }

        #[test]
        fn std_read_trait() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            let mut text = String::new();
            Read::read_to_string(&mut patch, &mut text).unwrap();
            assert_eq!(text, CONTENT);
        }
    }

    mod writes {
        use super::*;

        #[test]
        fn writes_append_in_order() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.write_text("a\n").unwrap();
            patch.write_lines(["b\n", "c\n"]).unwrap();
            patch.write_bytes(b"d\n").unwrap();
            patch.commit().unwrap();
            assert_eq!(fx.read(), "a\nb\nc\nd\n");
        }

        #[test]
        fn write_returns_byte_count() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            assert_eq!(patch.write_text("é").unwrap(), 2);
        }

        #[test]
        fn text_writes_rejected_in_binary_mode() {
            let fx = Fixture::new();
            let mut patch = Patch::with_options(&fx.path, PatchOptions::default().binary()).unwrap();
            assert!(matches!(
                patch.write_text("x"),
                Err(PatchError::ModeMismatch { .. })
            ));
            patch.write_bytes(&[0, 1, 2]).unwrap();
            patch.commit().unwrap();
            assert_eq!(fs::read(&fx.path).unwrap(), vec![0, 1, 2]);
        }

        #[test]
        fn std_write_trait() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            writeln!(patch, "{}-{}", 1, 2).unwrap();
            patch.commit().unwrap();
            assert_eq!(fx.read(), "1-2\n");
        }

        #[test]
        fn write_after_close_staging() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.close_staging().unwrap();
            assert!(matches!(
                patch.write_text("x"),
                Err(PatchError::Closed("staging"))
            ));
        }
    }

    mod commit {
        use super::*;

        #[test]
        fn replaces_original_and_keeps_backup() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.write_text("new\n").unwrap();
            patch.commit().unwrap();

            let paths = fx.paths();
            assert_eq!(fx.read(), "new\n");
            assert_eq!(fs::read_to_string(paths.backup().unwrap()).unwrap(), CONTENT);
            assert!(!paths.staging().exists());
        }

        #[test]
        fn without_backup() {
            let fx = Fixture::new();
            let mut patch =
                Patch::with_options(&fx.path, PatchOptions::default().without_backup()).unwrap();
            patch.write_text("new\n").unwrap();
            patch.commit().unwrap();

            assert_eq!(fx.read(), "new\n");
            assert!(!fx.paths().backup().unwrap().exists());
        }

        #[test]
        fn overwrites_existing_backup() {
            let fx = Fixture::new();
            fs::write(fx.paths().backup().unwrap(), "ancient").unwrap();

            let mut patch = Patch::new(&fx.path).unwrap();
            patch.write_text("new\n").unwrap();
            patch.commit().unwrap();

            assert_eq!(
                fs::read_to_string(fx.paths().backup().unwrap()).unwrap(),
                CONTENT
            );
        }

        #[test]
        fn empty_edit_truncates() {
            let fx = Fixture::new();
            Patch::new(&fx.path).unwrap().commit().unwrap();
            assert_eq!(fx.read(), "");
        }

        #[test]
        fn tolerates_caller_closed_handles() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.write_text("kept\n").unwrap();
            patch.close_input();
            patch.close_staging().unwrap();
            patch.commit().unwrap();
            assert_eq!(fx.read(), "kept\n");
        }

        #[test]
        fn custom_suffixes() {
            let fx = Fixture::new();
            let options = PatchOptions {
                new_suffix: ".tmp".to_string(),
                backup_suffix: Some("~".to_string()),
                ..Default::default()
            };
            let mut patch = Patch::with_options(&fx.path, options).unwrap();
            assert!(fx.path.with_file_name("test.txt.tmp").exists());
            patch.write_text("x").unwrap();
            patch.commit().unwrap();
            assert_eq!(
                fs::read_to_string(fx.path.with_file_name("test.txt~")).unwrap(),
                CONTENT
            );
        }
    }

    mod rollback {
        use super::*;

        #[test]
        fn leaves_original_untouched() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            patch.write_text("discarded\n").unwrap();
            patch.rollback().unwrap();

            assert_eq!(fx.read(), CONTENT);
            assert!(!fx.paths().staging().exists());
            assert!(!fx.paths().backup().unwrap().exists());
        }

        #[test]
        fn leaves_existing_backup_alone() {
            let fx = Fixture::new();
            fs::write(fx.paths().backup().unwrap(), "older").unwrap();

            let mut patch = Patch::new(&fx.path).unwrap();
            patch.rollback().unwrap();
            assert_eq!(
                fs::read_to_string(fx.paths().backup().unwrap()).unwrap(),
                "older"
            );
        }

        #[test]
        fn fails_if_staging_vanished() {
            let fx = Fixture::new();
            let mut patch = Patch::new(&fx.path).unwrap();
            fs::remove_file(fx.paths().staging()).unwrap();

            let err = patch.rollback().unwrap_err();
            assert!(matches!(err, PatchError::Io { .. }));
            assert_eq!(patch.state(), PatchState::Open);
        }
    }

    mod scope {
        use super::*;

        #[derive(Debug, PartialEq)]
        struct Boom;

        #[test]
        fn ok_commits() {
            let fx = Fixture::new();
            let value = edit(&fx.path, PatchOptions::default(), |p| {
                p.write_text("scoped\n")?;
                Ok::<_, PatchError>(7)
            })
            .unwrap();
            assert_eq!(value, 7);
            assert_eq!(fx.read(), "scoped\n");
        }

        #[test]
        fn err_rolls_back() {
            let fx = Fixture::new();
            let result: Result<(), EditError<Boom>> =
                edit(&fx.path, PatchOptions::default(), |p| {
                    p.write_text("discarded").unwrap();
                    Err(Boom)
                });

            assert_eq!(result.unwrap_err().into_aborted(), Some(Boom));
            assert_eq!(fx.read(), CONTENT);
            assert!(!fx.paths().staging().exists());
        }

        #[test]
        fn panic_rolls_back() {
            let fx = Fixture::new();
            let path = fx.path.clone();
            let outcome = std::panic::catch_unwind(move || {
                let _ = edit(&path, PatchOptions::default(), |p| -> Result<(), Boom> {
                    p.write_text("discarded").unwrap();
                    panic!("boom")
                });
            });

            assert!(outcome.is_err());
            assert_eq!(fx.read(), CONTENT);
            assert!(!fx.paths().staging().exists());
        }

        #[test]
        fn begins_deferred_patch() {
            let fx = Fixture::new();
            let patch = Patch::with_options(&fx.path, PatchOptions::default().deferred()).unwrap();
            patch
                .scope(|p| p.write_text("begun\n").map(|_| ()))
                .unwrap();
            assert_eq!(fx.read(), "begun\n");
        }

        #[test]
        fn manual_rollback_inside_scope_stands() {
            let fx = Fixture::new();
            Patch::new(&fx.path)
                .unwrap()
                .scope(|p| {
                    p.write_text("x")?;
                    p.rollback()
                })
                .unwrap();
            assert_eq!(fx.read(), CONTENT);
        }
    }

    mod handle_source {
        use super::*;

        #[test]
        fn adopts_handle_and_derives_write_mode() {
            let fx = Fixture::new();
            let file = File::open(&fx.path).unwrap();
            let source = PatchSource::from_handle_with_mode(file, &fx.path, OpenMode::READ_BINARY);

            let mut patch = Patch::new(source).unwrap();
            assert!(patch.is_borrowed());
            assert_eq!(patch.write_mode(), OpenMode::WRITE_BINARY);

            assert_eq!(patch.read_bytes(None).unwrap(), CONTENT.as_bytes());
            patch.write_bytes(b"bytes\n").unwrap();
            patch.commit().unwrap();
            assert_eq!(fx.read(), "bytes\n");
        }

        #[test]
        fn configured_write_mode_is_overridden() {
            let fx = Fixture::new();
            let file = File::open(&fx.path).unwrap();
            let options = PatchOptions {
                write_mode: OpenMode::WRITE_BINARY,
                ..Default::default()
            };

            let patch =
                Patch::with_options(PatchSource::from_handle(file, &fx.path), options).unwrap();
            assert_eq!(patch.write_mode(), OpenMode::WRITE);
        }

        #[test]
        fn owned_handle_is_not_borrowed() {
            let fx = Fixture::new();
            let patch = Patch::new(&fx.path).unwrap();
            assert!(!patch.is_borrowed());
        }
    }

    mod recovery_on_begin {
        use super::*;

        #[test]
        fn restores_interrupted_commit() {
            let fx = Fixture::new();
            let paths = fx.paths();
            // Commit stopped after original → backup.
            fs::rename(&fx.path, paths.backup().unwrap()).unwrap();
            fs::write(paths.staging(), "stale staging").unwrap();

            let mut patch = Patch::new(&fx.path).unwrap();
            assert_eq!(patch.read_text(None).unwrap(), CONTENT);
            patch.rollback().unwrap();

            assert_eq!(fx.read(), CONTENT);
            assert!(!paths.backup().unwrap().exists());
            assert!(!paths.staging().exists());
        }

        #[test]
        fn default_policy_keeps_committed_content() {
            let fx = Fixture::new();
            fs::write(fx.paths().backup().unwrap(), "old backup").unwrap();

            let mut patch = Patch::new(&fx.path).unwrap();
            assert_eq!(patch.read_text(None).unwrap(), CONTENT);
        }

        #[test]
        fn always_policy_prefers_backup() {
            // A lone backup overwrites the current original under `Always`.
            let fx = Fixture::new();
            fs::write(fx.paths().backup().unwrap(), "old backup").unwrap();

            let options = PatchOptions {
                recovery: RecoveryPolicy::Always,
                ..Default::default()
            };
            let mut patch = Patch::with_options(&fx.path, options).unwrap();
            assert_eq!(patch.read_text(None).unwrap(), "old backup");
            patch.rollback().unwrap();
            assert_eq!(fx.read(), "old backup");
        }

        #[test]
        fn disabled_backups_skip_recovery() {
            let fx = Fixture::new();
            fs::rename(&fx.path, fx.paths().backup().unwrap()).unwrap();

            let err = Patch::with_options(&fx.path, PatchOptions::default().without_backup())
                .unwrap_err();
            assert!(matches!(err, PatchError::Io { action: "open", .. }));
        }
    }

    #[test]
    fn read_chars_stops_at_boundaries() {
        let mut reader = io::BufReader::with_capacity(1, "añb".as_bytes());
        assert_eq!(read_chars(&mut reader, 2).unwrap(), "añ");
        assert_eq!(read_chars(&mut reader, 2).unwrap(), "b");
    }

    #[test]
    fn error_display() {
        let err = PatchError::InvalidState {
            action: "commit",
            state: PatchState::RolledBack,
        };
        assert_eq!(err.to_string(), "cannot commit: edit is rolled back");

        let err = PatchError::Closed("staging");
        assert_eq!(err.to_string(), "staging handle is closed");
    }
}
