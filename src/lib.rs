//! Dunner - a YAML-based task runner that runs every step in a container
//!
//! Tasks are ordered lists of steps. A step either runs commands inside a
//! container image or follows another task, overriding its envs and mounts.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod ui;

// Re-export commonly used types
pub use error::{DunnerError, Result};

/// Current version of Dunner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
