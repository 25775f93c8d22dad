//! Step execution
//!
//! Drives every resolved step through the container engine, either one after
//! another or all at once.

use crate::error::{EngineError, ExecutionError, ExecutionResult};
use crate::runner::{
    ContainerEngine, ContainerSpec, ExecutionMode, PlannedStep, ResolvedStep, RunOptions,
};
use crate::ui::Printer;
use std::thread;

/// Runs resolved steps on a container engine
pub struct Driver<'a> {
    engine: &'a dyn ContainerEngine,
    options: RunOptions,
    printer: Printer,
}

impl<'a> Driver<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, options: RunOptions) -> Self {
        Driver {
            engine,
            options,
            printer: Printer::new(options.verbosity),
        }
    }

    /// Execute the plan
    ///
    /// A step whose resolution failed counts as a failed step. Sequential
    /// mode returns the first failure and leaves later steps untouched.
    /// Concurrent mode waits for every step and reports all failures together.
    pub fn run(&self, plan: &[PlannedStep]) -> ExecutionResult<()> {
        if self.options.dry_run {
            self.printer.plan(plan);
            return plan.iter().try_for_each(|planned| resolved(planned).map(|_| ()));
        }

        match self.options.mode {
            ExecutionMode::Sequential => {
                for planned in plan {
                    self.run_step(planned)?;
                }
                Ok(())
            }
            ExecutionMode::Concurrent => self.run_concurrent(plan),
        }
    }

    fn run_concurrent(&self, plan: &[PlannedStep]) -> ExecutionResult<()> {
        let results: Vec<(&PlannedStep, ExecutionResult<()>)> = thread::scope(|scope| {
            let handles: Vec<_> = plan
                .iter()
                .map(|planned| (planned, scope.spawn(move || self.run_step(planned))))
                .collect();

            handles
                .into_iter()
                .map(|(planned, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(ExecutionError::Engine {
                            step: planned.id.clone(),
                            source: EngineError::Panicked,
                        })
                    });
                    (planned, result)
                })
                .collect()
        });

        let failures: Vec<ExecutionError> = results
            .into_iter()
            .filter_map(|(planned, result)| {
                result.err().inspect(|e| {
                    self.printer.debug(&format!("{} failed: {}", planned.id, e));
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExecutionError::Aggregate(failures))
        }
    }

    /// Run one entry of the plan
    pub fn run_step(&self, planned: &PlannedStep) -> ExecutionResult<()> {
        self.run_resolved(resolved(planned)?)
    }

    /// Run every command of a resolved step, stopping at the first failure
    fn run_resolved(&self, step: &ResolvedStep) -> ExecutionResult<()> {
        self.printer.step_start(step);

        if step.commands.is_empty() {
            return self.run_container(step, &[]);
        }
        for command in &step.commands {
            self.run_container(step, command)?;
        }
        Ok(())
    }

    fn run_container(&self, step: &ResolvedStep, command: &[String]) -> ExecutionResult<()> {
        let engine_error = |source: EngineError| ExecutionError::Engine {
            step: step.id(),
            source,
        };

        let spec = ContainerSpec::for_command(step, command);
        if !command.is_empty() {
            self.printer.debug(&format!("  exec: {}", command.join(" ")));
        }

        let id = self.engine.create(&spec).map_err(engine_error)?;
        let result = self.drive_container(step, &id);

        // The container is removed whatever happened after creation.
        match self.engine.remove(&id) {
            Ok(()) => result,
            Err(e) if result.is_ok() => Err(engine_error(e)),
            Err(e) => {
                self.printer
                    .warn(&format!("failed to remove container {}: {}", id, e));
                result
            }
        }
    }

    fn drive_container(&self, step: &ResolvedStep, id: &str) -> ExecutionResult<()> {
        let engine_error = |source: EngineError| ExecutionError::Engine {
            step: step.id(),
            source,
        };

        self.engine.start(id).map_err(engine_error)?;
        let code = self.engine.wait(id).map_err(engine_error)?;
        let output = self.engine.logs(id).map_err(engine_error)?;

        self.printer.step_output(&step.task, &output);

        if code != 0 {
            return Err(ExecutionError::NonZeroExit {
                step: step.id(),
                code,
            });
        }
        Ok(())
    }
}

/// The resolved step, or its resolution failure as that step's error
fn resolved(planned: &PlannedStep) -> ExecutionResult<&ResolvedStep> {
    planned
        .resolved
        .as_ref()
        .map_err(|source| ExecutionError::Resolve {
            step: planned.id.clone(),
            source: source.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineResult, ResolveError, StepId};
    use crate::runner::{ContainerId, Verbosity};
    use std::sync::Mutex;

    /// Engine that records calls; a command starting with "fail" exits 1,
    /// the image "broken" cannot be created
    #[derive(Default)]
    struct FakeEngine {
        events: Mutex<Vec<String>>,
        specs: Mutex<Vec<ContainerSpec>>,
    }

    impl FakeEngine {
        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn spec_of(&self, id: &str) -> ContainerSpec {
            let index: usize = id.parse().unwrap();
            self.specs.lock().unwrap()[index].clone()
        }
    }

    impl ContainerEngine for FakeEngine {
        fn create(&self, spec: &ContainerSpec) -> EngineResult<ContainerId> {
            if spec.image == "broken" {
                return Err(EngineError::Command {
                    command: "docker create".to_string(),
                    stderr: "no such image".to_string(),
                });
            }
            let mut specs = self.specs.lock().unwrap();
            specs.push(spec.clone());
            let id = (specs.len() - 1).to_string();
            drop(specs);
            self.record(format!("create {}", spec.command.join(" ")));
            Ok(id)
        }

        fn start(&self, id: &str) -> EngineResult<()> {
            self.record(format!("start {}", self.spec_of(id).command.join(" ")));
            Ok(())
        }

        fn wait(&self, id: &str) -> EngineResult<i64> {
            let spec = self.spec_of(id);
            let failing = spec.command.first().is_some_and(|c| c.starts_with("fail"));
            Ok(if failing { 1 } else { 0 })
        }

        fn logs(&self, id: &str) -> EngineResult<String> {
            Ok(format!("{}\n", self.spec_of(id).command.join(" ")))
        }

        fn remove(&self, id: &str) -> EngineResult<()> {
            self.record(format!("remove {}", self.spec_of(id).command.join(" ")));
            Ok(())
        }
    }

    fn step(task: &str, position: usize, image: &str, commands: &[&[&str]]) -> PlannedStep {
        let step = ResolvedStep {
            task: task.to_string(),
            position,
            name: None,
            image: image.to_string(),
            dir: "/dunner".to_string(),
            user: None,
            commands: commands
                .iter()
                .map(|c| c.iter().map(|s| s.to_string()).collect())
                .collect(),
            envs: vec!["X=1".to_string()],
            mounts: Vec::new(),
        };
        PlannedStep {
            id: step.id(),
            resolved: Ok(step),
        }
    }

    fn unresolved(task: &str, position: usize, error: ResolveError) -> PlannedStep {
        PlannedStep {
            id: StepId {
                task: task.to_string(),
                position,
                name: None,
            },
            resolved: Err(error),
        }
    }

    fn options(mode: ExecutionMode) -> RunOptions {
        RunOptions::new()
            .with_mode(mode)
            .with_verbosity(Verbosity::Silent)
    }

    #[test]
    fn test_sequential_runs_in_order() {
        let engine = FakeEngine::default();
        let steps = vec![
            step("a", 0, "busybox", &[&["echo", "a"]]),
            step("b", 1, "busybox", &[&["echo", "b"]]),
        ];

        Driver::new(&engine, options(ExecutionMode::Sequential))
            .run(&steps)
            .unwrap();

        assert_eq!(
            engine.events(),
            vec![
                "create echo a",
                "start echo a",
                "remove echo a",
                "create echo b",
                "start echo b",
                "remove echo b",
            ]
        );
    }

    #[test]
    fn test_sequential_stops_at_first_failure() {
        let engine = FakeEngine::default();
        let steps = vec![
            step("a", 0, "busybox", &[&["fail"]]),
            step("b", 1, "busybox", &[&["echo", "b"]]),
        ];

        let err = Driver::new(&engine, options(ExecutionMode::Sequential))
            .run(&steps)
            .unwrap_err();

        assert!(matches!(err, ExecutionError::NonZeroExit { code: 1, .. }));
        assert_eq!(err.step().unwrap().task, "a");
        assert!(!engine.events().iter().any(|e| e.contains("echo b")));
        assert!(engine.events().contains(&"remove fail".to_string()));
    }

    #[test]
    fn test_concurrent_attempts_all_and_reports_failure() {
        let engine = FakeEngine::default();
        let steps = vec![
            step("a", 0, "busybox", &[&["fail"]]),
            step("b", 1, "busybox", &[&["echo", "b"]]),
        ];

        let err = Driver::new(&engine, options(ExecutionMode::Concurrent))
            .run(&steps)
            .unwrap_err();

        match err {
            ExecutionError::Aggregate(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].step().unwrap().task, "a");
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
        let events = engine.events();
        assert!(events.contains(&"start fail".to_string()));
        assert!(events.contains(&"start echo b".to_string()));
        assert!(events.contains(&"remove echo b".to_string()));
    }

    #[test]
    fn test_concurrent_success() {
        let engine = FakeEngine::default();
        let steps: Vec<_> = (0..4)
            .map(|i| step("t", i, "busybox", &[&["echo", "ok"]]))
            .collect();

        Driver::new(&engine, options(ExecutionMode::Concurrent))
            .run(&steps)
            .unwrap();
        assert_eq!(
            engine.events().iter().filter(|e| e.starts_with("remove")).count(),
            4
        );
    }

    #[test]
    fn test_multi_command_step_stops_at_failing_command() {
        let engine = FakeEngine::default();
        let steps = vec![step(
            "a",
            0,
            "busybox",
            &[&["ls", "/"], &["fail", "here"], &["never"]],
        )];

        let result = Driver::new(&engine, options(ExecutionMode::Sequential)).run(&steps);
        assert!(result.is_err());

        let events = engine.events();
        assert!(events.contains(&"remove ls /".to_string()));
        assert!(events.contains(&"remove fail here".to_string()));
        assert!(!events.iter().any(|e| e.contains("never")));
    }

    #[test]
    fn test_step_without_command_uses_image_default() {
        let engine = FakeEngine::default();
        let steps = vec![step("a", 0, "busybox", &[])];

        Driver::new(&engine, options(ExecutionMode::Sequential))
            .run(&steps)
            .unwrap();
        assert!(engine.spec_of("0").command.is_empty());
        assert_eq!(engine.spec_of("0").envs, vec!["X=1"]);
    }

    #[test]
    fn test_engine_failure_carries_step_identity() {
        let engine = FakeEngine::default();
        let steps = vec![step("build", 0, "broken", &[&["make"]])];

        let err = Driver::new(&engine, options(ExecutionMode::Sequential))
            .run(&steps)
            .unwrap_err();

        match &err {
            ExecutionError::Engine { step, source } => {
                assert_eq!(step.task, "build");
                assert!(matches!(source, EngineError::Command { .. }));
            }
            other => panic!("expected engine error, got {:?}", other),
        }
        assert!(err.to_string().starts_with("task 'build' step 1"));
    }

    #[test]
    fn test_dry_run_starts_nothing() {
        let engine = FakeEngine::default();
        let steps = vec![step("a", 0, "busybox", &[&["echo", "a"]])];

        Driver::new(&engine, options(ExecutionMode::Sequential).with_dry_run(true))
            .run(&steps)
            .unwrap();
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_sequential_runs_steps_before_unresolved_one() {
        let engine = FakeEngine::default();
        let steps = vec![
            step("run", 0, "busybox", &[&["echo", "a"]]),
            unresolved(
                "run",
                1,
                ResolveError::InsufficientArguments {
                    index: 2,
                    supplied: 1,
                },
            ),
            step("run", 2, "busybox", &[&["echo", "c"]]),
        ];

        let err = Driver::new(&engine, options(ExecutionMode::Sequential))
            .run(&steps)
            .unwrap_err();

        assert!(matches!(
            err,
            ExecutionError::Resolve {
                source: ResolveError::InsufficientArguments { .. },
                ..
            }
        ));
        assert_eq!(err.step().unwrap().position, 1);
        let events = engine.events();
        assert!(events.contains(&"remove echo a".to_string()));
        assert!(!events.iter().any(|e| e.contains("echo c")));
    }

    #[test]
    fn test_concurrent_runs_other_branches_of_unresolved_step() {
        let engine = FakeEngine::default();
        let steps = vec![
            step("run", 0, "busybox", &[&["echo", "a"]]),
            unresolved("run", 1, ResolveError::MissingEnvVar("FOO".to_string())),
        ];

        let err = Driver::new(&engine, options(ExecutionMode::Concurrent))
            .run(&steps)
            .unwrap_err();

        match err {
            ExecutionError::Aggregate(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(failures[0], ExecutionError::Resolve { .. }));
                assert_eq!(failures[0].step().unwrap().position, 1);
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
        let events = engine.events();
        assert!(events.contains(&"start echo a".to_string()));
        assert!(events.contains(&"remove echo a".to_string()));
    }

    #[test]
    fn test_dry_run_reports_unresolved_step() {
        let engine = FakeEngine::default();
        let steps = vec![
            step("a", 0, "busybox", &[&["echo", "a"]]),
            unresolved("a", 1, ResolveError::MissingEnvVar("FOO".to_string())),
        ];

        let err = Driver::new(&engine, options(ExecutionMode::Sequential).with_dry_run(true))
            .run(&steps)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "task 'a' step 2: could not find environment variable 'FOO'"
        );
        assert!(engine.events().is_empty());
    }
}
