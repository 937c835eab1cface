//! Treeget Core Library
//!
//! This library mirrors a remote directory tree, served by a JSON listing API
//! with byte-range capable file endpoints, onto the local filesystem.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`mirror`] - Listing fetch, directory walk, bounded file transfers
//! - [`target`] - Root identifier extraction from a pasted URL or UUID

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod mirror;
pub mod target;
#[cfg(test)]
pub mod test_support;
mod user_agent;

// Re-export commonly used types
pub use mirror::{
    BarReporter, DEFAULT_PARALLEL, MAX_PARALLEL, MirrorConfig, ProgressReporter, RunCoordinator,
    RunError, RunStats, SilentReporter,
};
pub use target::{TargetError, parse_target};
