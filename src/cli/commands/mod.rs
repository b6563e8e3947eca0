//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves paths against `--cwd`
//! 2. Builds editor options from config defaults and command-line flags
//! 3. Drives the editor and reports the outcome
//!
//! Handlers never write to an edited file directly.

mod apply;
mod completion;
mod config_cmd;
mod filter;
mod recover;
mod status;

// Re-export command functions for testing and direct invocation
pub use apply::apply;
pub use completion::completion;
pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use filter::filter;
pub use recover::recover;
pub use status::status;

use crate::cli::args::{Command, ConfigAction};
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::ops::{EditError, PatchOptions};
use anyhow::{Context as _, Result};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Apply { file, input, edit } => {
            let options = edit.apply_to(base_options()?);
            apply::apply(ctx, &file, input.as_deref(), options)
        }
        Command::Filter {
            file,
            edit,
            command,
        } => {
            let options = edit.apply_to(base_options()?);
            filter::filter(ctx, &file, &command, options)
        }
        Command::Recover { file, suffixes } => {
            let options = suffixes.apply_to(base_options()?);
            recover::recover(ctx, &file, &options)
        }
        Command::Status {
            file,
            json,
            suffixes,
        } => {
            let options = suffixes.apply_to(base_options()?);
            status::status(ctx, &file, json, &options)
        }
        Command::Config { action } => match action {
            ConfigAction::Get { key } => config_cmd::get(ctx, &key),
            ConfigAction::Set { key, value } => config_cmd::set(ctx, &key, &value),
            ConfigAction::List => config_cmd::list(ctx),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Editor options from the config file, before command-line overrides.
fn base_options() -> Result<PatchOptions> {
    let config = Config::load().context("Failed to load config")?;
    Ok(config.patch_options())
}

/// Turn a scoped-edit error into an `anyhow` error.
///
/// The closure's own error is passed through unchanged so its context chain
/// survives.
fn flatten_edit_error(err: EditError<anyhow::Error>) -> anyhow::Error {
    match err {
        EditError::Patch(e) => e.into(),
        EditError::Aborted(e) => e,
    }
}
