//! config command - Get, set, or list configuration values

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::config::{Config, GlobalConfig};
use crate::ui::output;

/// Get a configuration value.
pub fn get(_ctx: &Context, key: &str) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;

    // Key exists but has no value - exit silently
    if let Some(value) = config.global.get(key)? {
        println!("{}", value);
    }
    Ok(())
}

/// Set a configuration value.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?.global;
    config.set(key, value)?;

    let path = Config::write_global(&config).context("Failed to write config")?;

    output::success(format!("Set {} = {}", key, value), ctx.verbosity());
    output::debug(format!("wrote {}", path.display()), ctx.verbosity());
    Ok(())
}

/// List all configuration values.
pub fn list(ctx: &Context) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;

    match config.loaded_from() {
        Some(path) => output::print(format!("# Config file: {}", path.display()), ctx.verbosity()),
        None => output::print("# No config file, showing defaults", ctx.verbosity()),
    }

    for key in GlobalConfig::KEYS {
        let value = config
            .global
            .get(key)?
            .map(|v| format!("{:?}", v))
            .unwrap_or_else(|| "(not set)".to_string());
        println!("{} = {}", key, value);
    }
    Ok(())
}
