//! core
//!
//! Core types and operations for patchwork.
//!
//! # Modules
//!
//! - [`paths`] - Staging and backup path derivation
//! - [`mode`] - Open modes for the input and staging handles
//! - [`ops`] - The transactional editor and crash recovery
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - The original is only ever replaced by a rename, never written in place
//! - Every failure path leaves the original readable
//! - Misuse of the edit lifecycle is an error, not a silent no-op

pub mod config;
pub mod mode;
pub mod ops;
pub mod paths;
