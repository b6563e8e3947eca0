//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Resolve relative paths against this directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::ops::{PatchOptions, RecoveryPolicy};

/// Patchwork - transactional in-place file editing
#[derive(Parser, Debug)]
#[command(name = "pw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Resolve relative paths against this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Flags shared by every command that edits a file.
#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// Suffix for the staging file [default: .new]
    #[arg(long, value_name = "SUFFIX")]
    pub new_suffix: Option<String>,

    /// Suffix for the backup file [default: .old]
    #[arg(long, value_name = "SUFFIX", conflicts_with = "no_backup")]
    pub backup_suffix: Option<String>,

    /// Do not keep a backup of the original
    #[arg(long)]
    pub no_backup: bool,

    /// Edit in binary mode
    #[arg(long)]
    pub binary: bool,

    /// When to restore a leftover backup before editing
    #[arg(long, value_name = "POLICY")]
    pub recovery: Option<RecoveryPolicy>,

    /// Skip fsync of the staging file before commit
    #[arg(long)]
    pub no_sync: bool,
}

impl EditArgs {
    /// Apply these flags on top of `base`.
    pub fn apply_to(&self, mut base: PatchOptions) -> PatchOptions {
        if let Some(suffix) = &self.new_suffix {
            base.new_suffix = suffix.clone();
        }
        if let Some(suffix) = &self.backup_suffix {
            base.backup_suffix = (!suffix.is_empty()).then(|| suffix.clone());
        }
        if self.no_backup {
            base.backup_suffix = None;
        }
        if self.binary {
            base = base.binary();
        }
        if let Some(policy) = self.recovery {
            base.recovery = policy;
        }
        if self.no_sync {
            base.sync = false;
        }
        base
    }
}

/// Flags selecting which files a path-only command looks at.
#[derive(Args, Debug, Clone, Default)]
pub struct SuffixArgs {
    /// Suffix of the staging file [default: .new]
    #[arg(long, value_name = "SUFFIX")]
    pub new_suffix: Option<String>,

    /// Suffix of the backup file [default: .old]
    #[arg(long, value_name = "SUFFIX")]
    pub backup_suffix: Option<String>,
}

impl SuffixArgs {
    /// Apply these flags on top of `base`.
    pub fn apply_to(&self, base: PatchOptions) -> PatchOptions {
        EditArgs {
            new_suffix: self.new_suffix.clone(),
            backup_suffix: self.backup_suffix.clone(),
            ..Default::default()
        }
        .apply_to(base)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replace a file's content transactionally
    #[command(
        name = "apply",
        long_about = "Replace a file's content transactionally.\n\n\
            Reads the new content from --input or stdin and writes it to a staging \
            file next to FILE. Only once all input has been written is the staging \
            file renamed over FILE, so other readers never see a partial file. The \
            previous content is kept as FILE.old unless --no-backup is given.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Replace a file from stdin
    generate-hosts | pw apply /etc/hosts

    # Replace from another file, without keeping a backup
    pw apply settings.ini --input settings.ini.template --no-backup

    # Binary content
    pw apply image.png --input resized.png --binary"
    )]
    Apply {
        /// File to replace
        file: PathBuf,

        /// Read new content from this file instead of stdin
        #[arg(long, short, value_name = "PATH")]
        input: Option<PathBuf>,

        #[command(flatten)]
        edit: EditArgs,
    },

    /// Rewrite a file through a command
    #[command(
        name = "filter",
        long_about = "Rewrite a file through a command.\n\n\
            Runs CMD with FILE's content on stdin and stages CMD's stdout as the \
            new content. The edit is committed only if CMD exits successfully; \
            otherwise the staging file is discarded and FILE is left untouched.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Sort a file in place
    pw filter names.txt -- sort

    # Rewrite with sed, keeping the old content as config.ini~
    pw filter config.ini --backup-suffix '~' -- sed 's/debug=0/debug=1/'

    # A failing command leaves the file alone
    pw filter data.json -- jq '.invalid['"
    )]
    Filter {
        /// File to rewrite
        file: PathBuf,

        #[command(flatten)]
        edit: EditArgs,

        /// Command and arguments
        #[arg(last = true, required = true, value_name = "CMD")]
        command: Vec<String>,
    },

    /// Restore a file from its backup
    #[command(
        name = "recover",
        long_about = "Restore a file from its backup.\n\n\
            Renames FILE.old back onto FILE if the backup exists. Use this after a \
            crash between the two renames of a commit left FILE missing, or to undo \
            the most recent committed edit.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Check first, then recover
    pw status notes.txt
    pw recover notes.txt"
    )]
    Recover {
        /// File to restore
        file: PathBuf,

        #[command(flatten)]
        suffixes: SuffixArgs,
    },

    /// Show the edit state of a file
    #[command(
        name = "status",
        long_about = "Show the edit state of a file.\n\n\
            Lists the original, staging, and backup paths with their sizes and \
            classifies the state: clean, committed, staging present, interrupted \
            commit, or missing.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Human-readable
    pw status notes.txt

    # For scripts
    pw status notes.txt --json | jq .state"
    )]
    Status {
        /// File to inspect
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        suffixes: SuffixArgs,
    },

    /// Get, set, or list configuration values
    #[command(
        name = "config",
        long_about = "Get, set, or list configuration values.\n\n\
            Settings are stored in $PATCHWORK_CONFIG or ~/.patchwork/config.toml \
            and provide defaults that command-line flags override.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Never keep backups
    pw config set backup_suffix ''

    # Show everything
    pw config list"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for pw commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    pw completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    pw completion zsh >> ~/.zshrc

    # Fish
    pw completion fish > ~/.config/fish/completions/pw.fish

    # PowerShell
    pw completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// List all configuration values
    List,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
