//! Core configuration types
//!
//! This module defines the data structures that represent a .dunner.yaml configuration file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global environment assignments (`NAME=VALUE`) applied to every step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,

    /// Global mounts (`source:target[:w]`) applied to every step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<String>,

    /// Tasks defined in the configuration
    #[serde(default)]
    pub tasks: HashMap<String, Task>,
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// Usage description shown by `dunner list`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Task-level environment assignments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,

    /// Task-level mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<String>,

    /// Steps, executed in declaration order
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A step declaration: either a container run or a delegation to another task
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub enum Step {
    /// Run commands inside a container image
    Run(RunStep),

    /// Expand another task's steps in place
    Follow(FollowStep),
}

/// A step that runs inside a container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStep {
    pub name: Option<String>,
    pub image: String,
    pub dir: Option<String>,
    pub user: Option<User>,
    /// Commands run one after another; empty means the image's default command
    pub commands: Vec<Vec<String>>,
    pub envs: Vec<String>,
    pub mounts: Vec<String>,
}

/// A step that delegates to another task, overriding its envs and mounts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowStep {
    pub follow: String,
    pub envs: Vec<String>,
    pub mounts: Vec<String>,
}

/// Container user, either a numeric id or a name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum User {
    Id(u32),
    Name(String),
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            User::Id(id) => write!(f, "{}", id),
            User::Name(name) => f.write_str(name),
        }
    }
}

/// Flat on-disk shape of a step, before it is split into `Step` variants
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    /// Single command as a token list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Several commands, each a token list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<String>,
}

impl TryFrom<RawStep> for Step {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        match (raw.image, raw.follow) {
            (Some(_), Some(follow)) => Err(format!(
                "step cannot declare both 'image' and 'follow' (follow: {})",
                follow
            )),
            (None, None) => Err("step must declare either 'image' or 'follow'".to_string()),
            (None, Some(follow)) => {
                let mut extra = Vec::new();
                if raw.name.is_some() {
                    extra.push("name");
                }
                if raw.dir.is_some() {
                    extra.push("dir");
                }
                if raw.user.is_some() {
                    extra.push("user");
                }
                if raw.command.is_some() || !raw.commands.is_empty() {
                    extra.push("command");
                }
                if !extra.is_empty() {
                    return Err(format!(
                        "follow step '{}' only accepts 'envs' and 'mounts', found: {}",
                        follow,
                        extra.join(", ")
                    ));
                }
                Ok(Step::Follow(FollowStep {
                    follow,
                    envs: raw.envs,
                    mounts: raw.mounts,
                }))
            }
            (Some(image), None) => {
                let commands = raw.command.into_iter().chain(raw.commands).collect();
                Ok(Step::Run(RunStep {
                    name: raw.name,
                    image,
                    dir: raw.dir,
                    user: raw.user,
                    commands,
                    envs: raw.envs,
                    mounts: raw.mounts,
                }))
            }
        }
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        match step {
            Step::Run(run) => RawStep {
                name: run.name,
                image: Some(run.image),
                dir: run.dir,
                user: run.user,
                commands: run.commands,
                envs: run.envs,
                mounts: run.mounts,
                ..RawStep::default()
            },
            Step::Follow(follow) => RawStep {
                follow: Some(follow.follow),
                envs: follow.envs,
                mounts: follow.mounts,
                ..RawStep::default()
            },
        }
    }
}

impl Step {
    /// Envs declared directly on this step
    pub fn envs(&self) -> &[String] {
        match self {
            Step::Run(run) => &run.envs,
            Step::Follow(follow) => &follow.envs,
        }
    }

    /// Mounts declared directly on this step
    pub fn mounts(&self) -> &[String] {
        match self {
            Step::Run(run) => &run.mounts,
            Step::Follow(follow) => &follow.mounts,
        }
    }
}
