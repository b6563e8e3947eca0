//! apply command - Replace a file's content transactionally

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context as _, Result};

use super::flatten_edit_error;
use crate::cli::Context;
use crate::core::ops::{edit, PatchOptions};
use crate::ui::output;

/// Replace `file` with the content of `input`, or stdin if `None`.
///
/// In text mode the new content must be valid UTF-8; otherwise the edit is
/// rolled back and `file` is left untouched.
pub fn apply(ctx: &Context, file: &Path, input: Option<&Path>, options: PatchOptions) -> Result<()> {
    let path = ctx.resolve(file);
    let verbosity = ctx.verbosity();
    let binary = options.write_mode.is_binary();

    let mut reader: Box<dyn Read> = match input {
        Some(input) => {
            let input = ctx.resolve(input);
            Box::new(
                File::open(&input)
                    .with_context(|| format!("Failed to open input '{}'", input.display()))?,
            )
        }
        None => Box::new(io::stdin().lock()),
    };

    let written = edit(&path, options, |patch| -> Result<usize> {
        if binary {
            let copied = io::copy(&mut reader, patch).context("Failed to copy input")?;
            Ok(copied as usize)
        } else {
            let mut text = String::new();
            reader
                .read_to_string(&mut text)
                .context("Input is not valid UTF-8 text; use --binary")?;
            Ok(patch.write_text(&text)?)
        }
    })
    .map_err(flatten_edit_error)
    .with_context(|| format!("Failed to apply to '{}'", path.display()))?;

    output::debug(format!("staged {} bytes", written), verbosity);
    output::success(
        format!("Applied {} bytes to {}", written, path.display()),
        verbosity,
    );
    Ok(())
}
