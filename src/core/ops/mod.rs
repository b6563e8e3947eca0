//! core::ops
//!
//! The transactional edit and its crash recovery.
//!
//! # Modules
//!
//! - [`patch`] - The editor: begin, read/write passthroughs, commit, rollback
//! - [`source`] - Path or caller-supplied handle to read from
//! - [`recovery`] - Restoring backups left by interrupted commits
//!
//! # Architecture
//!
//! Every edit:
//! 1. Restores a pending backup if the recovery policy applies
//! 2. Opens the original for reading and `<original>.new` for writing
//! 3. Streams replacement content into staging
//! 4. On success: renames `original → backup`, then `staging → original`
//! 5. On failure: deletes staging and leaves the original untouched
//!
//! # Example
//!
//! ```no_run
//! use patchwork::core::ops::{Patch, PatchOptions};
//!
//! let mut patch = Patch::with_options("hosts", PatchOptions::default().without_backup())?;
//! let text = patch.read_text(None)?;
//! patch.write_text(&text.to_uppercase())?;
//! patch.commit()?;
//! # Ok::<_, patchwork::core::ops::PatchError>(())
//! ```

pub mod patch;
pub mod recovery;
pub mod source;

// Re-export main types for convenience
pub use patch::{edit, EditError, Lines, Patch, PatchError, PatchOptions, PatchState};
pub use recovery::{inspect, recover, recover_with, EditState, EditStatus, FileState, RecoveryPolicy};
pub use source::PatchSource;
