//! Test execution.
//!
//! The runner hands batches of discovered files to a [`TestExecutor`]. The
//! default [`ProcessExecutor`] launches the configured interpreter once per
//! batch and captures its output: the whole suite in one process, or one
//! process per file.

use crate::config::Config;
use crate::error::{SuiteError, SuiteResult};
use crate::models::{
    BatchResult, ExecutionMode, FileOutcome, RunConfiguration, TestCounts, TestFile,
};
use std::ffi::OsString;
use std::future::Future;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Execute the tests in a batch of files, in order.
///
/// Implementations never fail: a batch that cannot be run is reported as
/// [`FileOutcome::Errored`] so the remaining batches still run.
pub trait TestExecutor {
    fn execute(
        &self,
        files: &[TestFile],
        run: &RunConfiguration,
    ) -> impl Future<Output = BatchResult>;
}

/// Runs `interpreter [warnings_flag] [-I lib]... [suite_loader...] <files> [verbose_flag]`.
///
/// The suite loader is only used in suite mode.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    interpreter: String,
    libs: Vec<String>,
    warnings_flag: String,
    verbose_flag: String,
    suite_loader: Vec<String>,
    coverage_var: String,
    coverage_value: String,
}

impl ProcessExecutor {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interpreter: config.runner.interpreter.clone(),
            libs: config.runner.libs.clone(),
            warnings_flag: config.runner.warnings_flag.clone(),
            verbose_flag: config.runner.verbose_flag.clone(),
            suite_loader: config.runner.suite_loader.clone(),
            coverage_var: config.coverage.env_var.clone(),
            coverage_value: config.coverage.env_value.clone(),
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Interpreter arguments for one batch.
    pub fn command_args(&self, files: &[TestFile], run: &RunConfiguration) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if run.warnings && !self.warnings_flag.is_empty() {
            args.push(self.warnings_flag.clone().into());
        }

        for lib in &self.libs {
            args.push("-I".into());
            args.push(lib.into());
        }

        if run.mode == ExecutionMode::Suite {
            args.extend(self.suite_loader.iter().map(OsString::from));
        }

        args.extend(files.iter().map(|f| f.path.clone().into_os_string()));

        if run.verbose && !self.verbose_flag.is_empty() {
            args.push(self.verbose_flag.clone().into());
        }

        args
    }

    fn command(&self, files: &[TestFile], run: &RunConfiguration) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(self.command_args(files, run))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // The child only sees the coverage flag when this run asked for it.
        if run.coverage {
            cmd.env(&self.coverage_var, &self.coverage_value);
        } else {
            cmd.env_remove(&self.coverage_var);
        }

        cmd
    }
}

impl TestExecutor for ProcessExecutor {
    async fn execute(&self, files: &[TestFile], run: &RunConfiguration) -> BatchResult {
        let start = Instant::now();
        debug!(
            "Running {} {:?}",
            self.interpreter(),
            self.command_args(files, run)
        );

        let output = self.command(files, run).output().await;
        let duration_seconds = start.elapsed().as_secs_f64();

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let outcome = if output.status.success() {
                    FileOutcome::Passed
                } else {
                    FileOutcome::Failed {
                        exit_code: output.status.code(),
                    }
                };

                let diagnostics = if run.warnings {
                    extract_warnings(&stderr)
                } else {
                    Vec::new()
                };

                BatchResult {
                    files: files.to_vec(),
                    outcome,
                    duration_seconds,
                    counts: TestCounts::find_in(&stdout),
                    diagnostics,
                    output: combine_output(&stdout, &stderr),
                }
            }
            Err(e) => BatchResult {
                files: files.to_vec(),
                outcome: FileOutcome::Errored {
                    message: format!("failed to run {}: {}", self.interpreter, e),
                },
                duration_seconds,
                counts: None,
                diagnostics: Vec::new(),
                output: String::new(),
            },
        }
    }
}

/// Interpreter warning lines, e.g. `foo_test.rb:3: warning: assigned but unused variable`.
pub fn extract_warnings(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .filter(|line| line.to_lowercase().contains("warning:"))
        .map(|line| line.trim().to_string())
        .collect()
}

fn combine_output(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr),
    }
}

/// Check that the coverage flag can be handed to child processes.
pub fn validate_coverage_env(name: &str, value: &str) -> SuiteResult<()> {
    if name.is_empty() {
        return Err(SuiteError::CoverageSetup(
            "coverage variable name is empty".to_string(),
        ));
    }

    if name.contains('=') || name.contains('\0') {
        return Err(SuiteError::CoverageSetup(format!(
            "invalid coverage variable name: {:?}",
            name
        )));
    }

    if value.contains('\0') {
        return Err(SuiteError::CoverageSetup(format!(
            "invalid value for {}: {:?}",
            name, value
        )));
    }

    Ok(())
}
