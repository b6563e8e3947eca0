//! status command - Show the edit state of a file

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::ops::{inspect, FileState, PatchOptions};
use crate::ui::output;

/// Show the original, staging, and backup files of `file`.
pub fn status(ctx: &Context, file: &Path, json: bool, options: &PatchOptions) -> Result<()> {
    let paths = options.paths_for(ctx.resolve(file));
    let status = inspect(&paths)
        .with_context(|| format!("Failed to inspect '{}'", paths.original().display()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to serialize status")?
        );
        return Ok(());
    }

    let verbosity = ctx.verbosity();
    output::print(format!("state:    {}", status.state), verbosity);
    output::print(describe("original", &status.original), verbosity);
    output::print(describe("staging", &status.staging), verbosity);
    match &status.backup {
        Some(backup) => output::print(describe("backup", backup), verbosity),
        None => output::print("backup:   (disabled)", verbosity),
    }

    if status.state.needs_recovery() {
        output::warn(
            format!(
                "commit was interrupted; run 'pw recover {}'",
                file.display()
            ),
            verbosity,
        );
    }
    Ok(())
}

fn describe(label: &str, file: &FileState) -> String {
    let detail = match file.size {
        Some(size) => format!("{} bytes", size),
        None => "absent".to_string(),
    };
    format!(
        "{:<9} {} ({})",
        format!("{}:", label),
        file.path.display(),
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn describe_present_and_absent() {
        let present = FileState {
            path: PathBuf::from("a.txt"),
            exists: true,
            size: Some(12),
        };
        assert_eq!(describe("original", &present), "original: a.txt (12 bytes)");

        let absent = FileState {
            path: PathBuf::from("a.txt.new"),
            exists: false,
            size: None,
        };
        assert_eq!(describe("staging", &absent), "staging:  a.txt.new (absent)");
    }
}
