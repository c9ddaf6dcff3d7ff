//! Run progress reporting.
//!
//! The runner talks to a [`RunReporter`] so that console output stays out of
//! the execution loop.

use crate::models::{BatchResult, FileOutcome, RunSummary, TestFile, TestFileSet};
use indicatif::{ProgressBar, ProgressStyle};

/// Receives run events in order.
pub trait RunReporter {
    /// Called once discovery has produced the file set.
    fn on_discovery_complete(&mut self, _files: &TestFileSet) {}

    /// Called before a batch is executed. `index` is zero-based and `total`
    /// counts batches.
    fn on_batch_start(&mut self, index: usize, total: usize, files: &[TestFile]);

    /// Called after a batch has been executed.
    fn on_batch_complete(&mut self, result: &BatchResult);

    /// Called once every batch has run.
    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// Console reporter.
///
/// Verbose mode prints one line per batch; otherwise a progress bar is shown
/// for per-file runs and only failures and warnings are printed.
#[derive(Default)]
pub struct ConsoleReporter {
    verbose: bool,
    progress: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            progress: None,
        }
    }

    fn print(&self, line: &str) {
        match self.progress {
            Some(ref pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }
}

impl RunReporter for ConsoleReporter {
    fn on_discovery_complete(&mut self, files: &TestFileSet) {
        if files.is_empty() {
            eprintln!("No test files collected");
            return;
        }

        eprintln!("🔍 Collected {} test files", files.len());
    }

    fn on_batch_start(&mut self, index: usize, total: usize, files: &[TestFile]) {
        if index == 0 && !self.verbose && total > 1 {
            let pb = ProgressBar::new(total as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            self.progress = Some(pb);
        }

        let label = match files {
            [file] => file.path.display().to_string(),
            files => format!("suite of {} files", files.len()),
        };

        match self.progress {
            Some(ref pb) => pb.set_message(label),
            None => {
                if self.verbose {
                    eprint!("[{}/{}] {} ... ", index + 1, total, label);
                }
            }
        }
    }

    fn on_batch_complete(&mut self, result: &BatchResult) {
        let millis = (result.duration_seconds * 1000.0).round() as u64;

        if self.verbose && self.progress.is_none() {
            let status = match result.outcome {
                FileOutcome::Passed => format!("\x1b[32mPASSED\x1b[0m ({}ms)", millis),
                FileOutcome::Failed { .. } => format!("\x1b[31mFAILED\x1b[0m ({}ms)", millis),
                FileOutcome::Errored { .. } => format!("\x1b[31mERROR\x1b[0m ({}ms)", millis),
            };
            eprintln!("{}", status);

            if let Some(counts) = result.counts {
                eprintln!(
                    "    {} tests, {} assertions, {} failures, {} errors",
                    counts.tests, counts.assertions, counts.failures, counts.errors
                );
            }
        }

        for warning in &result.diagnostics {
            self.print(&format!("⚠️  {}", warning));
        }

        match result.outcome {
            FileOutcome::Passed => {}
            FileOutcome::Failed { exit_code } => {
                let code = exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                self.print(&format!(
                    "\n\x1b[31m{} failed (exit {})\x1b[0m",
                    result.describe(),
                    code
                ));
                if !result.output.is_empty() {
                    self.print(result.output.trim_end());
                }
            }
            FileOutcome::Errored { ref message } => {
                self.print(&format!(
                    "\n\x1b[31m{}: {}\x1b[0m",
                    result.describe(),
                    message
                ));
            }
        }

        if let Some(ref pb) = self.progress {
            pb.inc(1);
        }
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }

        let mut parts = Vec::new();
        if summary.passed > 0 {
            parts.push(format!("\x1b[32m{} passed\x1b[0m", summary.passed));
        }
        if summary.failed > 0 {
            parts.push(format!("\x1b[31m{} failed\x1b[0m", summary.failed));
        }
        if summary.errored > 0 {
            parts.push(format!("\x1b[31m{} errored\x1b[0m", summary.errored));
        }
        if summary.warnings > 0 {
            parts.push(format!("\x1b[33m{} warnings\x1b[0m", summary.warnings));
        }
        if parts.is_empty() {
            parts.push("no tests ran".to_string());
        }

        eprintln!();
        if summary.total_runs == summary.total_files {
            eprintln!(
                "====== {} in {:.2}s ======",
                parts.join(", "),
                summary.duration_seconds
            );
        } else {
            eprintln!(
                "====== {} files, {} in {:.2}s ======",
                summary.total_files,
                parts.join(", "),
                summary.duration_seconds
            );
        }
        if summary.counts.tests > 0 {
            eprintln!(
                "       {} tests, {} assertions, {} failures, {} errors, {} skips",
                summary.counts.tests,
                summary.counts.assertions,
                summary.counts.failures,
                summary.counts.errors,
                summary.counts.skips
            );
        }
    }
}
