//! Host environment references
//!
//! Step fields may embed host variables as `` `$NAME` `` or `` `${NAME}` ``.
//! They are expanded before the step reaches the container engine.

use crate::error::{ResolveError, ResolveResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::env;
use std::sync::LazyLock;

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))`")
        .expect("environment reference pattern is valid")
});

/// Source of host environment variables
#[derive(Debug, Clone)]
pub struct HostEnv {
    /// Variables that take precedence over the process environment
    overlay: HashMap<String, String>,

    /// Whether to fall back to the process environment
    inherit: bool,
}

impl HostEnv {
    /// The process environment
    pub fn process() -> Self {
        HostEnv {
            overlay: HashMap::new(),
            inherit: true,
        }
    }

    /// A fixed set of variables, ignoring the process environment
    pub fn fixed(vars: HashMap<String, String>) -> Self {
        HostEnv {
            overlay: vars,
            inherit: false,
        }
    }

    /// Layer extra variables (e.g. from a dotenv file) on top
    pub fn with_overlay(mut self, vars: HashMap<String, String>) -> Self {
        self.overlay.extend(vars);
        self
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.overlay.get(name) {
            return Some(value.clone());
        }
        if self.inherit {
            return env::var(name).ok();
        }
        None
    }
}

impl Default for HostEnv {
    fn default() -> Self {
        HostEnv::process()
    }
}

/// Expand every host environment reference in `value`
pub fn expand_env(value: &str, host: &HostEnv) -> ResolveResult<String> {
    let mut missing = None;

    let expanded = ENV_REFERENCE.replace_all(value, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match host.get(name) {
            Some(found) => found,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ResolveError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}

/// Expand references in an optional field
pub fn expand_env_opt(value: Option<&str>, host: &HostEnv) -> ResolveResult<Option<String>> {
    value.map(|v| expand_env(v, host)).transpose()
}
