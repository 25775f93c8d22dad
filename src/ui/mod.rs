//! Terminal output
//!
//! Status lines go to stderr, container output goes to stdout. Each step's
//! output is written as a single block so concurrent steps never interleave.

use crate::runner::{PlannedStep, ResolvedStep, Verbosity};
use colored::Colorize;
use std::io::{self, Write};

/// Writes status messages and step output according to a verbosity level
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    verbosity: Verbosity,
}

impl Printer {
    pub fn new(verbosity: Verbosity) -> Self {
        Printer { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[INFO]".green(), message);
        }
    }

    /// Print debug message (only in verbose mode)
    pub fn debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "[DEBUG]".blue(), message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "[WARN]".yellow(), message);
        }
    }

    /// Announce a step before its container starts
    pub fn step_start(&self, step: &ResolvedStep) {
        self.info(&format!("Running {} with image '{}'", step.id(), step.image));
        self.debug(&format!("  dir: {}", step.dir));
        if let Some(user) = &step.user {
            self.debug(&format!("  user: {}", user));
        }
        for env in &step.envs {
            self.debug(&format!("  env: {}", env));
        }
        for mount in &step.mounts {
            self.debug(&format!("  mount: {}", mount));
        }
    }

    /// Write the captured output of one container, prefixed by its task name
    pub fn step_output(&self, task: &str, output: &str) {
        if self.verbosity == Verbosity::Silent || output.is_empty() {
            return;
        }

        let block = format_output_block(task, output);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        // A closed stdout is not worth failing the run over.
        let _ = handle.write_all(block.as_bytes());
        let _ = handle.flush();
    }

    /// Print a plan without running it
    pub fn plan(&self, steps: &[PlannedStep]) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = handle.write_all(format_plan(steps).as_bytes());
        let _ = handle.flush();
    }
}

/// Prefix every output line with the task name
pub fn format_output_block(task: &str, output: &str) -> String {
    let prefix = format!("[{}]", task);
    let mut block = String::new();
    for line in output.lines() {
        block.push_str(&prefix);
        block.push(' ');
        block.push_str(line);
        block.push('\n');
    }
    block
}

/// Human-readable description of a plan
///
/// Steps that could not be resolved show their error instead of the details.
pub fn format_plan(steps: &[PlannedStep]) -> String {
    let mut text = String::new();
    for planned in steps {
        let step = match &planned.resolved {
            Ok(step) => step,
            Err(e) => {
                text.push_str(&format!("{}: error: {}\n", planned.id, e));
                continue;
            }
        };

        text.push_str(&format!("{}: image={} dir={}\n", planned.id, step.image, step.dir));
        if let Some(user) = &step.user {
            text.push_str(&format!("  user: {}\n", user));
        }
        if step.commands.is_empty() {
            text.push_str("  command: <image default>\n");
        }
        for command in &step.commands {
            text.push_str(&format!("  command: {}\n", command.join(" ")));
        }
        for env in &step.envs {
            text.push_str(&format!("  env: {}\n", env));
        }
        for mount in &step.mounts {
            text.push_str(&format!("  mount: {}\n", mount));
        }
    }
    text
}
