//! Task resolution and execution engine
//!
//! This module turns task declarations into resolved container steps
//! (argument substitution, environment expansion, layered merging, follow
//! expansion) and drives those steps through a container engine.

pub mod args;
pub mod context;
pub mod driver;
pub mod engine;
pub mod env;
pub mod merge;
pub mod resolve;

// Re-export main types
pub use args::*;
pub use context::*;
pub use driver::*;
pub use engine::*;
pub use env::*;
pub use merge::*;
pub use resolve::*;
