//! recover command - Restore a file from its backup

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::ops::{self, PatchOptions};
use crate::ui::output;

/// Restore `file` from its backup if one exists.
pub fn recover(ctx: &Context, file: &Path, options: &PatchOptions) -> Result<()> {
    let paths = options.paths_for(ctx.resolve(file));
    let verbosity = ctx.verbosity();

    let Some(backup) = paths.backup() else {
        bail!("Backups are disabled; there is nothing to recover from");
    };

    let restored = ops::recover(&paths)
        .with_context(|| format!("Failed to recover '{}'", paths.original().display()))?;

    if restored {
        output::success(
            format!(
                "Restored {} from {}",
                paths.original().display(),
                backup.display()
            ),
            verbosity,
        );
    } else {
        output::print(
            format!("Nothing to recover: no backup at {}", backup.display()),
            verbosity,
        );
    }

    if paths.staging().exists() {
        output::warn(
            format!(
                "staging file {} is still present; remove it or rerun the edit",
                paths.staging().display()
            ),
            verbosity,
        );
    }
    Ok(())
}
