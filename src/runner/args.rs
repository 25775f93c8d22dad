//! Positional argument substitution
//!
//! Replaces `$1`, `$2`, ... tokens in command token lists with the arguments
//! given on the command line.

use crate::error::{ResolveError, ResolveResult};
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$([1-9][0-9]*)$").expect("placeholder pattern is valid"));

/// Index (1-based) referenced by a whole-token placeholder such as `$2`
fn placeholder_index(token: &str) -> Option<usize> {
    PLACEHOLDER
        .captures(token)
        .and_then(|caps| caps[1].parse().ok())
}

/// Substitute positional arguments into every command of a step
///
/// Fails without returning any partially substituted command when a
/// placeholder refers past the end of `args`.
pub fn substitute_args(
    commands: &[Vec<String>],
    args: &[String],
) -> ResolveResult<Vec<Vec<String>>> {
    commands
        .iter()
        .map(|command| substitute_command(command, args))
        .collect()
}

/// Substitute positional arguments into a single command
pub fn substitute_command(command: &[String], args: &[String]) -> ResolveResult<Vec<String>> {
    command
        .iter()
        .map(|token| match placeholder_index(token) {
            Some(index) => args.get(index - 1).cloned().ok_or(
                ResolveError::InsufficientArguments {
                    index,
                    supplied: args.len(),
                },
            ),
            None => Ok(token.clone()),
        })
        .collect()
}
