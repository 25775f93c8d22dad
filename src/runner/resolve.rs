//! Task resolution
//!
//! Turns a task declaration into the flat list of container steps that will
//! actually run. Follow steps are expanded in place and their envs/mounts
//! override every step of the followed task.

use crate::config::{Config, FollowStep, RunStep, Step, Task, User};
use crate::error::{ResolveError, ResolveResult, StepId};
use crate::runner::{
    expand_env, expand_env_opt, merge_envs, merge_mounts, substitute_args, HostEnv, Mount,
};
use std::env;
use std::path::{Path, PathBuf};

/// Container path the workspace is mounted at
pub const WORKSPACE_TARGET: &str = "/dunner";

/// A step ready to be handed to the container engine
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    /// Task that declared this step
    pub task: String,

    /// Position in the resolved plan
    pub position: usize,

    pub name: Option<String>,
    pub image: String,

    /// Working directory inside the container
    pub dir: String,

    pub user: Option<User>,

    /// Commands with positional arguments substituted
    pub commands: Vec<Vec<String>>,

    /// Final `NAME=VALUE` list, one entry per name
    pub envs: Vec<String>,

    /// Final mounts, one entry per container target
    pub mounts: Vec<Mount>,
}

impl ResolvedStep {
    /// Identity used in progress output and errors
    pub fn id(&self) -> StepId {
        StepId {
            task: self.task.clone(),
            position: self.position,
            name: self.name.clone(),
        }
    }
}

/// One entry of a plan: the step's identity and the outcome of resolving it
///
/// Argument substitution and host variable expansion errors are fatal for
/// this step only; the driver reports them as the step's failure.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub id: StepId,
    pub resolved: ResolveResult<ResolvedStep>,
}

/// Numeric id of the user running dunner, used when a step names no user
#[cfg(unix)]
pub fn host_user() -> Option<User> {
    Some(User::Id(uzers::get_current_uid()))
}

#[cfg(not(unix))]
pub fn host_user() -> Option<User> {
    None
}

/// Resolves tasks of a configuration into container steps
pub struct Resolver<'a> {
    config: &'a Config,
    host: HostEnv,
    workspace: PathBuf,
    default_user: Option<User>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver using the process environment, the current directory
    /// and the host user
    pub fn new(config: &'a Config) -> Self {
        Resolver {
            config,
            host: HostEnv::process(),
            workspace: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            default_user: host_user(),
        }
    }

    /// Use a specific source for host environment references
    pub fn with_host_env(mut self, host: HostEnv) -> Self {
        self.host = host;
        self
    }

    /// Set the host directory mounted as the workspace
    pub fn with_workspace(mut self, dir: PathBuf) -> Self {
        self.workspace = dir;
        self
    }

    /// Set the user for steps that name none (`None` keeps the image default)
    pub fn with_default_user(mut self, user: Option<User>) -> Self {
        self.default_user = user;
        self
    }

    /// Resolve a task into the ordered plan to execute
    ///
    /// Unknown tasks, follow cycles and malformed env or mount text fail the
    /// whole plan. Errors while finishing a single step are kept in that
    /// step's entry.
    pub fn resolve(&self, task_name: &str, args: &[String]) -> ResolveResult<Vec<PlannedStep>> {
        let mut stack = Vec::new();
        let mut plan = Vec::new();

        self.expand_task(task_name, args, None, &mut stack, &mut plan)?;

        for (position, planned) in plan.iter_mut().enumerate() {
            planned.id.position = position;
            if let Ok(step) = planned.resolved.as_mut() {
                step.position = position;
            }
        }
        Ok(plan)
    }

    fn expand_task(
        &self,
        task_name: &str,
        args: &[String],
        calling: Option<&FollowStep>,
        stack: &mut Vec<String>,
        out: &mut Vec<PlannedStep>,
    ) -> ResolveResult<()> {
        if stack.iter().any(|t| t == task_name) {
            let mut chain = stack.clone();
            chain.push(task_name.to_string());
            return Err(ResolveError::CircularFollow(chain.join(" -> ")));
        }

        let task = self
            .config
            .tasks
            .get(task_name)
            .ok_or_else(|| ResolveError::TaskNotFound(task_name.to_string()))?;

        stack.push(task_name.to_string());
        for step in &task.steps {
            match step {
                Step::Follow(follow) => {
                    self.expand_task(&follow.follow, args, Some(follow), stack, out)?;
                }
                Step::Run(run) => {
                    out.push(self.plan_step(task_name, task, run, calling, args)?);
                }
            }
        }
        stack.pop();

        Ok(())
    }

    fn plan_step(
        &self,
        task_name: &str,
        task: &Task,
        run: &RunStep,
        calling: Option<&FollowStep>,
        args: &[String],
    ) -> ResolveResult<PlannedStep> {
        let (over_envs, over_mounts) = match calling {
            Some(follow) => (follow.envs.as_slice(), follow.mounts.as_slice()),
            None => (&[][..], &[][..]),
        };

        let envs = merge_envs(&[
            over_envs,
            run.envs.as_slice(),
            task.envs.as_slice(),
            self.config.envs.as_slice(),
        ])?;
        let mounts = merge_mounts(&[
            over_mounts,
            run.mounts.as_slice(),
            task.mounts.as_slice(),
            self.config.mounts.as_slice(),
        ])?;

        Ok(PlannedStep {
            id: StepId {
                task: task_name.to_string(),
                position: 0,
                name: run.name.clone(),
            },
            resolved: self.finish_step(task_name, run, &envs, mounts, args),
        })
    }

    /// Expand host references, normalise paths and substitute arguments
    fn finish_step(
        &self,
        task_name: &str,
        run: &RunStep,
        envs: &[String],
        mounts: Vec<Mount>,
        args: &[String],
    ) -> ResolveResult<ResolvedStep> {
        let envs = envs
            .iter()
            .map(|assignment| expand_env(assignment, &self.host))
            .collect::<ResolveResult<Vec<_>>>()?;

        let mut mounts = mounts
            .into_iter()
            .map(|mount| -> ResolveResult<Mount> {
                Ok(Mount {
                    source: self.host_path(&expand_env(&mount.source, &self.host)?)?,
                    target: expand_env(&mount.target, &self.host)?,
                    read_only: mount.read_only,
                })
            })
            .collect::<ResolveResult<Vec<_>>>()?;

        if !mounts.iter().any(|m| m.target == WORKSPACE_TARGET) {
            mounts.push(Mount {
                source: self.workspace.display().to_string(),
                target: WORKSPACE_TARGET.to_string(),
                read_only: false,
            });
        }

        let dir = match expand_env_opt(run.dir.as_deref(), &self.host)? {
            None => WORKSPACE_TARGET.to_string(),
            Some(dir) if dir.starts_with('/') => dir,
            Some(dir) => format!("{}/{}", WORKSPACE_TARGET, dir.trim_start_matches("./")),
        };

        let commands = substitute_args(&run.commands, args)?;

        Ok(ResolvedStep {
            task: task_name.to_string(),
            position: 0,
            name: run.name.clone(),
            image: run.image.clone(),
            dir,
            user: run.user.clone().or_else(|| self.default_user.clone()),
            commands,
            envs,
            mounts,
        })
    }

    /// Absolute host path for a mount source
    fn host_path(&self, source: &str) -> ResolveResult<String> {
        let path = if source == "~" || source.starts_with("~/") {
            let home = directories::BaseDirs::new()
                .map(|dirs| dirs.home_dir().to_path_buf())
                .ok_or_else(|| ResolveError::NoHomeDir(source.to_string()))?;
            match source.trim_start_matches('~').trim_start_matches('/') {
                "" => home,
                rest => home.join(rest),
            }
        } else if Path::new(source).is_absolute() {
            PathBuf::from(source)
        } else {
            self.workspace.join(source.trim_start_matches("./"))
        };

        Ok(path.display().to_string())
    }
}
