//! Main CLI application

use crate::config::{
    find_config_file, load_env_file, parse_config_file, validate_config, Config, DEFAULT_ENV_FILE,
};
use crate::error::{ConfigError, DunnerError};
use crate::runner::{DockerCli, Driver, ExecutionMode, HostEnv, Resolver, RunOptions, Verbosity};
use crate::ui::Printer;
use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Written by `dunner init`
pub const STARTER_CONFIG: &str = r#"# Global settings apply to every step of every task
envs:
  - GREETING=hello

tasks:
  build:
    steps:
      - image: alpine
        command: ["echo", "building"]
  test:
    steps:
      - follow: build
        envs:
          - GREETING=overridden
      - image: alpine
        command: ["sh", "-c", "echo $GREETING $1"]
"#;

/// CLI application
pub struct App {
    /// Parsed configuration
    config: Config,
    /// Config file path
    config_path: PathBuf,
    /// Output for status messages
    printer: Printer,
}

impl App {
    /// Load and validate the configuration named by the global flags
    pub fn load(matches: &ArgMatches) -> Result<Self, DunnerError> {
        let config_path = match matches.get_one::<String>("task-file") {
            Some(path) => PathBuf::from(path),
            None => find_config_file()?,
        };
        let config = parse_config_file(&config_path)?;
        validate_config(&config)?;

        Ok(App {
            config,
            config_path,
            printer: Printer::new(get_verbosity(matches)),
        })
    }

    /// Directory holding the configuration file; mounted as the workspace
    fn workspace(&self) -> PathBuf {
        let dir = self
            .config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
    }

    /// Resolve and run a task
    pub fn run_task(&self, matches: &ArgMatches, sub: &ArgMatches) -> Result<(), DunnerError> {
        let task_name = sub
            .get_one::<String>("task")
            .ok_or_else(|| ConfigError::Invalid("no task given".to_string()))?;
        let args: Vec<String> = sub
            .get_many::<String>("args")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let workspace = self.workspace();
        let env_file = matches
            .get_one::<String>("env-file")
            .map(PathBuf::from)
            .unwrap_or_else(|| workspace.join(DEFAULT_ENV_FILE));
        let host = HostEnv::process().with_overlay(load_env_file(&env_file)?);

        let plan = Resolver::new(&self.config)
            .with_host_env(host)
            .with_workspace(workspace)
            .resolve(task_name, &args)?;

        let mode = if sub.get_flag("async") {
            ExecutionMode::Concurrent
        } else {
            ExecutionMode::Sequential
        };
        let options = RunOptions::new()
            .with_mode(mode)
            .with_verbosity(self.printer.verbosity())
            .with_dry_run(sub.get_flag("dry-run"));

        self.printer.info(&format!("Running task: {}", task_name));
        self.printer.debug(&format!(
            "{} step(s) resolved, mode {:?}",
            plan.len(),
            options.mode
        ));

        let engine = match sub.get_one::<String>("engine") {
            Some(program) => DockerCli::new().with_program(program),
            None => DockerCli::new(),
        };
        Driver::new(&engine, options).run(&plan)?;

        self.printer.debug(&format!("Task completed: {}", task_name));
        Ok(())
    }

    /// Print every task with its usage and step count
    pub fn list(&self) {
        let mut names: Vec<&String> = self.config.tasks.keys().collect();
        names.sort();

        for name in names {
            let task = &self.config.tasks[name];
            let usage = task.usage.as_deref().unwrap_or_default();
            println!("{:<20} {:>3} step(s)  {}", name, task.steps.len(), usage);
        }
    }
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("dunner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run tasks whose steps execute inside containers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("task-file")
                .short('t')
                .long("task-file")
                .value_name("FILE")
                .help("Path to the .dunner.yaml task file")
                .global(true),
        )
        .arg(
            Arg::new("env-file")
                .short('e')
                .long("env-file")
                .value_name("FILE")
                .help("Dotenv file providing host variables (default: .env next to the task file)")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("do")
                .about("Run a task")
                .arg(Arg::new("task").value_name("TASK").required(true))
                .arg(
                    Arg::new("args")
                        .value_name("ARGS")
                        .help("Positional arguments substituted for $1, $2, ...")
                        .num_args(0..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true),
                )
                .arg(
                    Arg::new("async")
                        .short('A')
                        .long("async")
                        .help("Run all steps concurrently")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Print the resolved steps without running them")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("engine")
                        .long("engine")
                        .value_name("PROGRAM")
                        .help("Docker-compatible client to use (default: docker)"),
                ),
        )
        .subcommand(Command::new("list").about("List the tasks of the task file"))
        .subcommand(Command::new("validate").about("Check the task file for errors"))
        .subcommand(Command::new("init").about("Write a starter task file"))
        .subcommand(
            Command::new("completion")
                .about("Print a shell completion script")
                .arg(
                    Arg::new("shell")
                        .value_name("SHELL")
                        .required(true)
                        .value_parser(clap::value_parser!(Shell)),
                ),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Write the starter task file, never overwriting
fn init(matches: &ArgMatches) -> Result<(), DunnerError> {
    let path = matches
        .get_one::<String>("task-file")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".dunner.yaml"));

    if path.exists() {
        return Err(ConfigError::AlreadyExists(path).into());
    }
    fs::write(&path, STARTER_CONFIG)?;

    Printer::new(get_verbosity(matches)).info(&format!("Created {}", path.display()));
    Ok(())
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<(), DunnerError> {
    run_from(std::env::args_os())
}

/// Run the CLI application with explicit arguments
pub fn run_from<I, T>(args: I) -> Result<(), DunnerError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().get_matches_from(args);

    match matches.subcommand() {
        Some(("do", sub)) => App::load(&matches)?.run_task(&matches, sub),
        Some(("list", _)) => {
            App::load(&matches)?.list();
            Ok(())
        }
        Some(("validate", _)) => {
            let app = App::load(&matches)?;
            println!("{} is valid", app.config_path.display());
            Ok(())
        }
        Some(("init", _)) => init(&matches),
        Some(("completion", sub)) => {
            if let Some(shell) = sub.get_one::<Shell>("shell") {
                clap_complete::generate(*shell, &mut build_command(), "dunner", &mut io::stdout());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
