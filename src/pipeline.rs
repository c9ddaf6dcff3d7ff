//! Task pipeline.
//!
//! Each task expands to an ordered list of steps. Steps run in order and the
//! pipeline stops at the first step that does not succeed.
//!
//! | task        | steps                     |
//! |-------------|---------------------------|
//! | `test`      | tests                     |
//! | `base-test` | tests                     |
//! | `coverage`  | tests (coverage on)       |
//! | `build`     | build                     |
//! | `default`   | tests, build              |

use crate::config::Config;
use crate::error::{SuiteError, SuiteResult};
use crate::models::{ExecutionMode, RunMetadata, RunPhase, RunReport};
use crate::runner::{self, validate_coverage_env, RunReporter, TestExecutor};
use crate::scanner::{DiscoveryRoots, TestScanner};
use chrono::Utc;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Named entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Test,
    BaseTest,
    Coverage,
    Build,
    Default,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Test => "test",
            Task::BaseTest => "base_test",
            Task::Coverage => "coverage",
            Task::Build => "build",
            Task::Default => "default",
        }
    }

    /// Steps run by this task, in order.
    pub fn steps(&self) -> Vec<Step> {
        match self {
            Task::Test | Task::BaseTest => vec![Step::Tests { coverage: false }],
            Task::Coverage => vec![Step::Tests { coverage: true }],
            Task::Build => vec![Step::Build],
            Task::Default => vec![Step::Tests { coverage: false }, Step::Build],
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One unit of work in a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Discover and run the aggregated test suite.
    Tests { coverage: bool },
    /// Run the external build command.
    Build,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Tests { coverage: false } => "tests",
            Step::Tests { coverage: true } => "tests (coverage)",
            Step::Build => "build",
        }
    }
}

/// How a step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed,
    /// Nothing to do (e.g. no build command configured).
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
}

/// Result of running a task to completion or to its first failing step.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub task: Task,
    pub steps: Vec<StepRecord>,
    /// Report of the test step, when one ran.
    pub report: Option<RunReport>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Failed)
    }
}

/// Runs tasks against one configuration.
pub struct Pipeline<'a, E, R> {
    config: &'a Config,
    roots: Option<DiscoveryRoots>,
    executor: E,
    reporter: R,
    preset_coverage: Option<String>,
    phase: RunPhase,
}

impl<'a, E, R> Pipeline<'a, E, R>
where
    E: TestExecutor,
    R: RunReporter,
{
    /// `roots` may be `None` for tasks without a test step.
    /// `preset_coverage` is the coverage variable's value in the invoking
    /// environment, consulted only when `coverage.honor_env` is set.
    pub fn new(
        config: &'a Config,
        roots: Option<DiscoveryRoots>,
        executor: E,
        reporter: R,
        preset_coverage: Option<String>,
    ) -> Self {
        Self {
            config,
            roots,
            executor,
            reporter,
            preset_coverage,
            phase: RunPhase::NotStarted,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: RunPhase) {
        debug!("Run phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Run all steps of `task`, stopping at the first failure.
    ///
    /// Test failures are reported through the outcome; discovery, coverage
    /// setup and build errors are returned as `Err`.
    pub async fn run_task(&mut self, task: Task) -> SuiteResult<PipelineOutcome> {
        info!("Running task `{}`", task);

        let mut outcome = PipelineOutcome {
            task,
            steps: Vec::new(),
            report: None,
        };

        for step in task.steps() {
            let status = match step {
                Step::Tests { coverage } => {
                    let report = self.run_tests(task, coverage).await?;
                    let passed = report.summary.is_success();
                    outcome.report = Some(report);
                    if passed {
                        StepStatus::Passed
                    } else {
                        StepStatus::Failed
                    }
                }
                Step::Build => run_build(&self.config.build.command).await?,
            };

            debug!("Step `{}` finished: {:?}", step.name(), status);
            outcome.steps.push(StepRecord { step, status });

            if status == StepStatus::Failed {
                warn!("Step `{}` failed; skipping remaining steps", step.name());
                break;
            }
        }

        Ok(outcome)
    }

    async fn run_tests(&mut self, task: Task, coverage: bool) -> SuiteResult<RunReport> {
        let roots = self
            .roots
            .clone()
            .ok_or_else(|| SuiteError::RootsNotConfigured(task.name().to_string()))?;

        let base = self
            .config
            .run_configuration(self.preset_coverage.as_deref());

        if coverage || base.coverage {
            validate_coverage_env(&self.config.coverage.env_var, &self.config.coverage.env_value)?;
            if base.mode == ExecutionMode::PerFile {
                warn!("Coverage with per-file runs: each process writes its own result and the report may only reflect the last file");
            }
        }

        let started_at = Utc::now();

        self.set_phase(RunPhase::Discovering);
        let scanner = TestScanner::new(
            self.config.test_file_pattern(),
            self.config.discovery.strict,
        );
        let files = scanner.discover(&roots)?;
        self.reporter.on_discovery_complete(&files);

        self.set_phase(RunPhase::Running);
        let run = if coverage {
            runner::run_with_coverage(&files, base, &self.executor, &mut self.reporter).await
        } else {
            runner::run(&files, base, &self.executor, &mut self.reporter).await
        };
        self.set_phase(RunPhase::Completed {
            passed: run.passed(),
        });

        Ok(RunReport {
            metadata: RunMetadata {
                task: task.name().to_string(),
                started_at,
                configuration: run.configuration,
                plugins_dir: roots.plugins_dir,
                scripts_dir: roots.scripts_dir,
            },
            summary: run.summary,
            files: run.results,
        })
    }
}

/// Run the external build command. An empty command skips the step.
pub async fn run_build(command: &[String]) -> SuiteResult<StepStatus> {
    let Some((program, args)) = command.split_first() else {
        warn!("No build command configured; skipping build step");
        return Ok(StepStatus::Skipped);
    };

    let command_line = command.join(" ");
    info!(command = %command_line, "Running build");

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|source| SuiteError::BuildNotLaunched {
            command: command_line.clone(),
            source,
        })?;

    if status.success() {
        Ok(StepStatus::Passed)
    } else {
        Err(SuiteError::BuildFailed {
            command: command_line,
            status: status.to_string(),
        })
    }
}
