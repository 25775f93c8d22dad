//! Common test utilities

#![allow(dead_code)]

use dunner::config::Config;
use dunner::error::ResolveResult;
use dunner::runner::{HostEnv, PlannedStep, ResolvedStep, Resolver};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory with a .dunner.yaml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join(".dunner.yaml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Resolver with a fixed host environment and a fixed workspace
pub fn resolver<'a>(config: &'a Config, vars: &[(&str, &str)]) -> Resolver<'a> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Resolver::new(config)
        .with_host_env(HostEnv::fixed(vars))
        .with_workspace(PathBuf::from("/workspace"))
        .with_default_user(None)
}

/// Every step of a plan, or the first error met
pub fn resolve_all(plan: ResolveResult<Vec<PlannedStep>>) -> ResolveResult<Vec<ResolvedStep>> {
    plan?.into_iter().map(|planned| planned.resolved).collect()
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
