//! CLI interface and argument parsing
//!
//! This module handles command-line interface parsing, dispatching to the
//! task runner, and shell completion.

pub mod app;

// Re-export main types
pub use app::*;
