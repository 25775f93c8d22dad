//! Configuration validation
//!
//! Checks a whole document up front so that mistakes in tasks other than the
//! one being run are still reported by `dunner validate`.

use crate::config::types::{Config, Step};
use crate::error::{ConfigError, ConfigResult, ResolveError};
use crate::runner::{env_name, Mount};
use std::collections::HashSet;

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    validate_lists(&config.envs, &config.mounts).map_err(|e| {
        ConfigError::Invalid(format!("global settings: {}", e))
    })?;

    let mut names: Vec<&String> = config.tasks.keys().collect();
    names.sort();

    for name in &names {
        validate_task(config, name).map_err(|error| ConfigError::InvalidTask {
            task: name.to_string(),
            error,
        })?;
    }

    detect_circular_follows(config, &names)?;

    Ok(())
}

/// Validate a single task
pub fn validate_task(config: &Config, name: &str) -> Result<(), ResolveError> {
    let task = config
        .tasks
        .get(name)
        .ok_or_else(|| ResolveError::TaskNotFound(name.to_string()))?;

    validate_lists(&task.envs, &task.mounts)?;

    for step in &task.steps {
        validate_lists(step.envs(), step.mounts())?;

        if let Step::Follow(follow) = step {
            if !config.tasks.contains_key(&follow.follow) {
                return Err(ResolveError::TaskNotFound(follow.follow.clone()));
            }
        }
    }

    Ok(())
}

fn validate_lists(envs: &[String], mounts: &[String]) -> Result<(), ResolveError> {
    for env in envs {
        env_name(env)?;
    }
    for mount in mounts {
        Mount::parse(mount)?;
    }
    Ok(())
}

/// Detect cycles in follow relationships
fn detect_circular_follows(config: &Config, names: &[&String]) -> ConfigResult<()> {
    let mut visited = HashSet::new();
    for task_name in names {
        let mut stack = Vec::new();
        check_follow_cycle(config, task_name, &mut visited, &mut stack)?;
    }
    Ok(())
}

/// Recursively check for cycles starting at a task
fn check_follow_cycle(
    config: &Config,
    task_name: &str,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
) -> ConfigResult<()> {
    if stack.iter().any(|t| t == task_name) {
        stack.push(task_name.to_string());
        return Err(ConfigError::InvalidTask {
            task: stack[0].clone(),
            error: ResolveError::CircularFollow(stack.join(" -> ")),
        });
    }

    // Fully explored tasks cannot start a new cycle
    if visited.contains(task_name) {
        return Ok(());
    }

    let Some(task) = config.tasks.get(task_name) else {
        return Ok(());
    };

    stack.push(task_name.to_string());
    for step in &task.steps {
        if let Step::Follow(follow) = step {
            check_follow_cycle(config, &follow.follow, visited, stack)?;
        }
    }
    stack.pop();

    visited.insert(task_name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_valid_config() {
        let config = parse_config(
            r#"
envs:
  - GLB=VARBL
mounts:
  - /var:/tmp
tasks:
  build:
    envs:
      - A=1
    steps:
      - image: busybox
        mounts:
          - /src:/src:w
  run:
    steps:
      - follow: build
        envs:
          - B=2
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_unknown_follow_target() {
        let config = parse_config(
            r#"
tasks:
  run:
    steps:
      - follow: nowhere
"#,
        )
        .unwrap();

        let err = validate_config(&config).unwrap_err();
        match err {
            ConfigError::InvalidTask { task, error } => {
                assert_eq!(task, "run");
                assert_eq!(error, ResolveError::TaskNotFound("nowhere".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_mount_in_step() {
        let config = parse_config(
            r#"
tasks:
  build:
    steps:
      - image: busybox
        mounts:
          - /just-a-path
"#,
        )
        .unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidTask {
                error: ResolveError::InvalidMount { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_global_env() {
        let config = parse_config("envs:\n  - NOEQUALS\ntasks: {}\n").unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_follow_cycle_detected() {
        let config = parse_config(
            r#"
tasks:
  a:
    steps:
      - follow: b
  b:
    steps:
      - follow: c
  c:
    steps:
      - follow: a
"#,
        )
        .unwrap();

        let err = validate_config(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Task 'a': circular follow detected: a -> b -> c -> a"
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let config = parse_config(
            r#"
tasks:
  top:
    steps:
      - follow: left
      - follow: right
  left:
    steps:
      - follow: base
  right:
    steps:
      - follow: base
  base:
    steps:
      - image: alpine
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }
}
