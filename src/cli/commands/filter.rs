//! filter command - Rewrite a file through a command

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{anyhow, bail, Context as _, Result};

use super::flatten_edit_error;
use crate::cli::Context;
use crate::core::ops::{edit, PatchOptions};
use crate::ui::output;

/// Pipe `file` through `command` and stage its stdout.
///
/// The edit commits only if the command exits successfully. In text mode the
/// command's output must also be valid UTF-8.
pub fn filter(ctx: &Context, file: &Path, command: &[String], options: PatchOptions) -> Result<()> {
    let path = ctx.resolve(file);
    let verbosity = ctx.verbosity();
    let binary = options.write_mode.is_binary();
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("No command given"))?;

    edit(&path, options, |patch| -> Result<()> {
        let content = patch.read_bytes(None)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &ctx.cwd {
            cmd.current_dir(cwd);
        }

        output::debug(format!("running {}", command.join(" ")), verbosity);
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run '{}'", program))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to open stdin of '{}'", program))?;
        let feeder = thread::spawn(move || match stdin.write_all(&content) {
            // The command may stop reading early, e.g. `head`.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        });

        let mut staged = Vec::new();
        let copied = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Failed to open stdout of '{}'", program))
            .and_then(|mut stdout| {
                stdout
                    .read_to_end(&mut staged)
                    .context("Failed to read command output")
            });
        if let Err(e) = copied {
            // Reap the child so the feeder sees a closed pipe and exits.
            let _ = child.kill();
            let _ = child.wait();
            let _ = feeder.join();
            return Err(e);
        }

        let status = child.wait().context("Failed to wait for command")?;
        feeder
            .join()
            .map_err(|_| anyhow!("Input writer panicked"))?
            .context("Failed to write file content to command")?;

        if !status.success() {
            bail!("'{}' failed ({}); file left unchanged", program, status);
        }

        if binary {
            patch.write_bytes(&staged)?;
        } else {
            let text = String::from_utf8(staged)
                .context("Command output is not valid UTF-8 text; use --binary")?;
            patch.write_text(&text)?;
        }
        Ok(())
    })
    .map_err(flatten_edit_error)
    .with_context(|| format!("Failed to filter '{}'", path.display()))?;

    output::success(format!("Rewrote {}", path.display()), verbosity);
    Ok(())
}
