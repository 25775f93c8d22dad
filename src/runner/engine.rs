//! Container engine interface
//!
//! The driver only needs create/start/wait/logs/remove. `DockerCli` provides
//! them by shelling out to the docker client.

use crate::config::User;
use crate::error::{EngineError, EngineResult};
use crate::runner::{Mount, ResolvedStep};
use std::process::{Command as StdCommand, Output, Stdio};

/// Everything needed to create one container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub image: String,
    /// Empty means the image's default command
    pub command: Vec<String>,
    pub dir: String,
    pub user: Option<User>,
    pub envs: Vec<String>,
    pub mounts: Vec<Mount>,
}

impl ContainerSpec {
    /// Build the spec for one command of a resolved step
    pub fn for_command(step: &ResolvedStep, command: &[String]) -> Self {
        ContainerSpec {
            image: step.image.clone(),
            command: command.to_vec(),
            dir: step.dir.clone(),
            user: step.user.clone(),
            envs: step.envs.clone(),
            mounts: step.mounts.clone(),
        }
    }
}

/// Identifier returned by `ContainerEngine::create`
pub type ContainerId = String;

/// Operations the runner needs from a container engine
///
/// Implementations are shared across threads when steps run concurrently.
pub trait ContainerEngine: Send + Sync {
    fn create(&self, spec: &ContainerSpec) -> EngineResult<ContainerId>;

    fn start(&self, id: &str) -> EngineResult<()>;

    /// Block until the container stops and return its exit code
    fn wait(&self, id: &str) -> EngineResult<i64>;

    /// Combined stdout and stderr of the container
    fn logs(&self, id: &str) -> EngineResult<String>;

    fn remove(&self, id: &str) -> EngineResult<()>;
}

/// Container engine backed by the `docker` command-line client
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new() -> Self {
        DockerCli {
            program: "docker".to_string(),
        }
    }

    /// Use another docker-compatible client (e.g. `podman`)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments for `docker create`
    pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["create".to_string(), "--workdir".to_string(), spec.dir.clone()];

        if let Some(user) = &spec.user {
            args.push("--user".to_string());
            args.push(user.to_string());
        }

        for env in &spec.envs {
            args.push("--env".to_string());
            args.push(env.clone());
        }

        for mount in &spec.mounts {
            let mut value = format!("type=bind,source={},target={}", mount.source, mount.target);
            if mount.read_only {
                value.push_str(",readonly");
            }
            args.push("--mount".to_string());
            args.push(value);
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }

    fn exec(&self, args: &[String]) -> EngineResult<Output> {
        let output = StdCommand::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| EngineError::Spawn {
                program: self.program.clone(),
                error,
            })?;

        if !output.status.success() {
            return Err(EngineError::Command {
                command: self.describe(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.first().map(String::as_str).unwrap_or_default())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerEngine for DockerCli {
    fn create(&self, spec: &ContainerSpec) -> EngineResult<ContainerId> {
        let args = Self::create_args(spec);
        let output = self.exec(&args)?;

        let id = String::from_utf8_lossy(&output.stdout)
            .lines()
            .last()
            .unwrap_or_default()
            .trim()
            .to_string();
        if id.is_empty() {
            return Err(EngineError::Output {
                command: self.describe(&args),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(id)
    }

    fn start(&self, id: &str) -> EngineResult<()> {
        self.exec(&["start".to_string(), id.to_string()])?;
        Ok(())
    }

    fn wait(&self, id: &str) -> EngineResult<i64> {
        let args = ["wait".to_string(), id.to_string()];
        let output = self.exec(&args)?;
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();

        text.parse().map_err(|_| EngineError::Output {
            command: self.describe(&args),
            output: text,
        })
    }

    fn logs(&self, id: &str) -> EngineResult<String> {
        let output = self.exec(&["logs".to_string(), id.to_string()])?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }

    fn remove(&self, id: &str) -> EngineResult<()> {
        self.exec(&["rm".to_string(), "--force".to_string(), id.to_string()])?;
        Ok(())
    }
}
