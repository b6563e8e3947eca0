//! core::mode
//!
//! Open modes for the input and staging handles.
//!
//! # Syntax
//!
//! A mode string is one intent character, an optional `+`, and an optional
//! format character:
//!
//! | Intent | Meaning |
//! |--------|---------|
//! | `r` | read an existing file |
//! | `w` | write, creating or truncating |
//! | `a` | append, creating if missing |
//! | `x` | write, failing if the file exists |
//!
//! `+` adds the opposite capability (read for `w`/`a`/`x`, write for `r`).
//! `b` selects binary mode, `t` (or nothing) selects text mode.
//!
//! # Example
//!
//! ```
//! use patchwork::core::mode::{Intent, OpenMode};
//!
//! let mode: OpenMode = "rb".parse().unwrap();
//! assert_eq!(mode.intent(), Intent::Read);
//! assert!(mode.is_binary());
//! assert_eq!(mode.with_write_intent().to_string(), "wb");
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a mode string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid open mode '{mode}': {reason}")]
pub struct ModeParseError {
    /// The rejected mode string.
    pub mode: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// The primary intent of an open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `a`
    Append,
    /// `x`
    Exclusive,
}

impl Intent {
    fn as_char(self) -> char {
        match self {
            Intent::Read => 'r',
            Intent::Write => 'w',
            Intent::Append => 'a',
            Intent::Exclusive => 'x',
        }
    }
}

/// A parsed open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OpenMode {
    intent: Intent,
    update: bool,
    binary: bool,
}

impl OpenMode {
    /// Text read mode, `r`.
    pub const READ: OpenMode = OpenMode {
        intent: Intent::Read,
        update: false,
        binary: false,
    };

    /// Text write mode, `w`.
    pub const WRITE: OpenMode = OpenMode {
        intent: Intent::Write,
        update: false,
        binary: false,
    };

    /// Binary read mode, `rb`.
    pub const READ_BINARY: OpenMode = OpenMode {
        intent: Intent::Read,
        update: false,
        binary: true,
    };

    /// Binary write mode, `wb`.
    pub const WRITE_BINARY: OpenMode = OpenMode {
        intent: Intent::Write,
        update: false,
        binary: true,
    };

    /// The primary intent.
    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Whether `+` was given.
    pub fn is_update(&self) -> bool {
        self.update
    }

    /// Whether the mode is binary.
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Whether a handle opened with this mode can be read from.
    pub fn is_readable(&self) -> bool {
        self.intent == Intent::Read || self.update
    }

    /// Whether a handle opened with this mode can be written to.
    pub fn is_writable(&self) -> bool {
        self.intent != Intent::Read || self.update
    }

    /// Return the same mode in binary or text form.
    pub fn binary(self, binary: bool) -> Self {
        Self { binary, ..self }
    }

    /// Replace a read or append intent with a write intent.
    ///
    /// This is how the staging mode is derived from the mode of a handle the
    /// caller opened: `r` becomes `w`, `rb` becomes `wb`, `r+` becomes `w+`.
    /// `a+` also becomes `w+`, so a leftover staging file is truncated rather
    /// than appended to. `w` and `x` are returned unchanged.
    pub fn with_write_intent(self) -> Self {
        match self.intent {
            Intent::Read | Intent::Append => Self {
                intent: Intent::Write,
                ..self
            },
            _ => self,
        }
    }

    /// Build the `OpenOptions` matching this mode.
    pub fn to_open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self.intent {
            Intent::Read => {
                options.read(true).write(self.update);
            }
            Intent::Write => {
                options
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .read(self.update);
            }
            Intent::Append => {
                options.append(true).create(true).read(self.update);
            }
            Intent::Exclusive => {
                options.write(true).create_new(true).read(self.update);
            }
        }
        options
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::READ
    }
}

impl FromStr for OpenMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| ModeParseError {
            mode: s.to_string(),
            reason,
        };

        let mut intent = None;
        let mut update = false;
        let mut format = None;

        for c in s.chars() {
            match c {
                'r' | 'w' | 'a' | 'x' => {
                    if intent.is_some() {
                        return Err(fail("more than one of 'r', 'w', 'a', 'x'"));
                    }
                    intent = Some(match c {
                        'r' => Intent::Read,
                        'w' => Intent::Write,
                        'a' => Intent::Append,
                        _ => Intent::Exclusive,
                    });
                }
                '+' => {
                    if update {
                        return Err(fail("'+' given twice"));
                    }
                    update = true;
                }
                'b' | 't' => {
                    if format.is_some() {
                        return Err(fail("more than one of 'b', 't'"));
                    }
                    format = Some(c);
                }
                _ => return Err(fail("unexpected character")),
            }
        }

        let intent = intent.ok_or_else(|| fail("missing one of 'r', 'w', 'a', 'x'"))?;

        Ok(Self {
            intent,
            update,
            binary: format == Some('b'),
        })
    }
}

impl TryFrom<String> for OpenMode {
    type Error = ModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OpenMode> for String {
    fn from(mode: OpenMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.intent.as_char())?;
        if self.update {
            write!(f, "+")?;
        }
        if self.binary {
            write!(f, "b")?;
        }
        Ok(())
    }
}
