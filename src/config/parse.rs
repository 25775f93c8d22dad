//! Configuration file parsing and discovery

use crate::config::types::Config;
use crate::error::{ConfigError, ConfigResult, DunnerError};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &[".dunner.yaml", ".dunner.yml"];

/// Default dotenv file, looked up next to the configuration file
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> Result<Config, DunnerError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    parse_config(&contents)
}

/// Parse configuration from a string
pub fn parse_config(yaml: &str) -> Result<Config, DunnerError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Load variables from a dotenv file
///
/// A missing file yields an empty map; a malformed one is an error.
pub fn load_env_file(path: &Path) -> ConfigResult<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let read_error = |e: dotenvy::Error| ConfigError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(read_error)? {
        let (key, value) = item.map_err(read_error)?;
        vars.insert(key, value);
    }
    Ok(vars)
}
