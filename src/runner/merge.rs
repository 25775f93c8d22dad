//! Layered environment and mount merging
//!
//! Layers are passed highest precedence first. The first occurrence of an
//! env name (or mount target) wins and keeps its position.

use crate::error::{ResolveError, ResolveResult};
use std::collections::HashSet;
use std::fmt;

/// A bind mount from the host into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl Mount {
    /// Parse `source:target`, `source:target:r` or `source:target:w`
    pub fn parse(spec: &str) -> ResolveResult<Self> {
        let invalid = |reason: &str| ResolveError::InvalidMount {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = spec.split(':').collect();
        let (source, target, mode) = match parts.as_slice() {
            [source, target] => (*source, *target, None),
            [source, target, mode] => (*source, *target, Some(*mode)),
            [_] => return Err(invalid("expected source:target[:w]")),
            _ => return Err(invalid("too many ':' separated fields")),
        };

        if source.is_empty() || target.is_empty() {
            return Err(invalid("source and target must not be empty"));
        }

        let read_only = match mode {
            None | Some("r") => true,
            Some("w") => false,
            Some(_) => return Err(invalid("mode must be 'r' or 'w'")),
        };

        Ok(Mount {
            source: source.to_string(),
            target: target.to_string(),
            read_only,
        })
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.target)?;
        if !self.read_only {
            f.write_str(":w")?;
        }
        Ok(())
    }
}

/// Name part of a `NAME=VALUE` assignment
pub fn env_name(assignment: &str) -> ResolveResult<&str> {
    match assignment.split_once('=') {
        Some((name, _)) if !name.is_empty() => Ok(name),
        _ => Err(ResolveError::InvalidEnv(assignment.to_string())),
    }
}

/// Merge env layers, highest precedence first, keeping the first assignment per name
pub fn merge_envs(layers: &[&[String]]) -> ResolveResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for assignment in layers.iter().flat_map(|layer| layer.iter()) {
        let name = env_name(assignment)?;
        if seen.insert(name.to_string()) {
            merged.push(assignment.clone());
        }
    }

    Ok(merged)
}

/// Merge mount layers, highest precedence first, keeping the first mount per target
pub fn merge_mounts(layers: &[&[String]]) -> ResolveResult<Vec<Mount>> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for spec in layers.iter().flat_map(|layer| layer.iter()) {
        let mount = Mount::parse(spec)?;
        if seen.insert(mount.target.clone()) {
            merged.push(mount);
        }
    }

    Ok(merged)
}
