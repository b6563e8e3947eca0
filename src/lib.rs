//! Patchwork - transactional in-place file editing
//!
//! Patchwork lets a program rewrite a file as if editing it in place while
//! guaranteeing that other readers of the file only ever see the complete old
//! content or the complete new content. New content is written to a staging
//! file next to the original and swapped in with a rename on commit; on
//! failure the staging file is discarded and the original is left untouched.
//!
//! # Architecture
//!
//! - [`core`] - Path derivation, open modes, the editor, recovery, config
//! - [`cli`] - The `pw` command-line interface
//! - [`logging`] - Tracing subscriber setup for the binary
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. The original path never holds partially written content
//! 2. A rolled-back edit leaves the original byte-for-byte unchanged
//! 3. A committed edit leaves the pre-edit content at the backup path
//! 4. An interrupted commit is repaired before the next edit begins
//!
//! # Example
//!
//! ```no_run
//! use patchwork::{edit, PatchError, PatchOptions};
//!
//! edit("notes.txt", PatchOptions::default(), |patch| {
//!     let text = patch.read_text(None)?;
//!     patch.write_text(&text.replace("TODO", "DONE"))?;
//!     Ok::<_, PatchError>(())
//! })?;
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod core;
pub mod logging;
pub mod ui;

pub use crate::core::mode::OpenMode;
pub use crate::core::ops::{
    edit, EditError, Patch, PatchError, PatchOptions, PatchSource, PatchState, RecoveryPolicy,
};
pub use crate::core::paths::PatchPaths;
