//! Aggregated test execution.
//!
//! Runs every file of a [`TestFileSet`] in order and folds the outcomes into
//! a single pass/fail [`RunSummary`]. Suite mode loads the whole set into one
//! interpreter process; per-file mode runs the files one at a time. A failing
//! file never stops the run.

pub mod executor;
pub mod reporter;

pub use executor::{validate_coverage_env, ProcessExecutor, TestExecutor};
pub use reporter::{ConsoleReporter, RunReporter};

use crate::models::{BatchResult, RunConfiguration, RunSummary, TestFileSet};
use std::time::Instant;
use tracing::{debug, info};

/// Results of one aggregated run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub configuration: RunConfiguration,
    pub results: Vec<BatchResult>,
    pub summary: RunSummary,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.summary.is_success()
    }
}

/// Execute every file with the given configuration.
pub async fn run<E, R>(
    files: &TestFileSet,
    config: RunConfiguration,
    executor: &E,
    reporter: &mut R,
) -> RunOutcome
where
    E: TestExecutor,
    R: RunReporter,
{
    let start = Instant::now();
    let batches = files.batches(config.mode);
    let total = batches.len();
    info!(
        "Running {} test files in {} run(s) (mode: {}, verbose: {}, warnings: {}, coverage: {})",
        files.len(),
        total,
        config.mode,
        config.verbose,
        config.warnings,
        config.coverage
    );

    let mut results = Vec::with_capacity(total);
    for (index, batch) in batches.into_iter().enumerate() {
        reporter.on_batch_start(index, total, batch);
        let result = executor.execute(batch, &config).await;
        debug!(
            "{} -> {} ({:.2}s)",
            result.describe(),
            result.outcome.label(),
            result.duration_seconds
        );
        reporter.on_batch_complete(&result);
        results.push(result);
    }

    let summary = RunSummary::from_results(&results, start.elapsed().as_secs_f64());
    reporter.on_run_complete(&summary);

    RunOutcome {
        configuration: config,
        results,
        summary,
    }
}

/// Same as [`run`] with coverage switched on before the first file executes.
pub async fn run_with_coverage<E, R>(
    files: &TestFileSet,
    config: RunConfiguration,
    executor: &E,
    reporter: &mut R,
) -> RunOutcome
where
    E: TestExecutor,
    R: RunReporter,
{
    run(files, config.with_coverage(), executor, reporter).await
}
