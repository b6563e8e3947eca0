//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All user-facing messages from `pw` go through this module so that
//! `--quiet` and `--debug` are honored consistently. Diagnostics from the
//! library go through `tracing` instead.

pub mod output;
