//! Error types for Dunner

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Dunner operations
pub type Result<T> = std::result::Result<T, DunnerError>;

/// Main error type for Dunner
#[derive(Error, Debug)]
pub enum DunnerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task and step resolution errors
    #[error("{0}")]
    Resolve(#[from] ResolveError),

    /// Task execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read '{path}': {error}")]
    Read { path: PathBuf, error: String },

    #[error("Task '{task}': {error}")]
    InvalidTask { task: String, error: ResolveError },

    #[error("Refusing to overwrite existing file '{0}'")]
    AlreadyExists(PathBuf),
}

/// Errors raised while turning task declarations into resolved steps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("circular follow detected: {0}")]
    CircularFollow(String),

    #[error("invalid mount '{spec}': {reason}")]
    InvalidMount { spec: String, reason: String },

    #[error("invalid environment assignment '{0}': expected NAME=VALUE")]
    InvalidEnv(String),

    #[error("insufficient number of arguments passed: command references ${index} but only {supplied} supplied")]
    InsufficientArguments { index: usize, supplied: usize },

    #[error("could not find environment variable '{0}'")]
    MissingEnvVar(String),

    #[error("could not determine the home directory for '{0}'")]
    NoHomeDir(String),
}

/// Errors reported by a container engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to launch '{program}': {error}")]
    Spawn { program: String, error: io::Error },

    #[error("'{command}' failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("unexpected engine output from '{command}': {output}")]
    Output { command: String, output: String },

    #[error("step panicked while running")]
    Panicked,
}

/// Identity of a resolved step, used in execution errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepId {
    pub task: String,
    pub position: usize,
    pub name: Option<String>,
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "task '{}' step {} ({})", self.task, self.position + 1, name),
            None => write!(f, "task '{}' step {}", self.task, self.position + 1),
        }
    }
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{step} exited with code {code}")]
    NonZeroExit { step: StepId, code: i64 },

    #[error("{step}: {source}")]
    Engine {
        step: StepId,
        #[source]
        source: EngineError,
    },

    #[error("{step}: {source}")]
    Resolve {
        step: StepId,
        #[source]
        source: ResolveError,
    },

    #[error("{} step(s) failed: {}", .0.len(), format_failures(.0))]
    Aggregate(Vec<ExecutionError>),
}

impl ExecutionError {
    /// Identity of the failing step, if this error belongs to a single step
    pub fn step(&self) -> Option<&StepId> {
        match self {
            ExecutionError::NonZeroExit { step, .. }
            | ExecutionError::Engine { step, .. }
            | ExecutionError::Resolve { step, .. } => Some(step),
            ExecutionError::Aggregate(_) => None,
        }
    }
}

fn format_failures(failures: &[ExecutionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for resolution operations
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Specialized result type for container engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
