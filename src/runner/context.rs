//! Run options
//!
//! Everything that shapes how a resolved plan is executed, passed explicitly
//! into the driver.

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    #[default]
    Normal = 2,
    Verbose = 3,
}

/// How resolved steps are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One step at a time, stopping at the first failure
    #[default]
    Sequential,

    /// All steps at once, failures collected after every step finished
    Concurrent,
}

/// Options for a single run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub mode: ExecutionMode,
    pub verbosity: Verbosity,
    /// Print the plan instead of starting containers
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution mode
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
