//! Data models for the test aggregator.
//!
//! This module contains the discovered test file set, the explicit run
//! configuration handed to the runner, and the per-batch and aggregate
//! outcomes that feed the console reporter and the run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;

/// Which configured directory a test file was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOrigin {
    /// Found under the plugin test directory
    Plugin,
    /// Found under `<base>/test/installer/scripts`
    Script,
}

impl fmt::Display for TestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOrigin::Plugin => write!(f, "plugin"),
            TestOrigin::Script => write!(f, "script"),
        }
    }
}

/// A single discovered test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFile {
    /// Path as discovered (configured directory joined with the file name).
    pub path: PathBuf,
    /// Directory group the file came from.
    pub origin: TestOrigin,
}

impl TestFile {
    pub fn new(path: PathBuf, origin: TestOrigin) -> Self {
        Self { path, origin }
    }

    /// File name for compact progress output.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Ordered set of test files: plugin tests first, then script tests.
///
/// Each half is sorted independently; the halves are never interleaved and
/// duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFileSet {
    files: Vec<TestFile>,
}

impl TestFileSet {
    /// Concatenate the two sorted groups.
    pub fn concat(plugin_paths: Vec<PathBuf>, script_paths: Vec<PathBuf>) -> Self {
        let files = plugin_paths
            .into_iter()
            .map(|p| TestFile::new(p, TestOrigin::Plugin))
            .chain(
                script_paths
                    .into_iter()
                    .map(|p| TestFile::new(p, TestOrigin::Script)),
            )
            .collect();

        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestFile> {
        self.files.iter()
    }

    pub fn as_slice(&self) -> &[TestFile] {
        &self.files
    }

    /// Number of files from the given origin.
    pub fn count_from(&self, origin: TestOrigin) -> usize {
        self.files.iter().filter(|f| f.origin == origin).count()
    }

    /// Split the set into interpreter invocations, keeping run order.
    pub fn batches(&self, mode: ExecutionMode) -> Vec<&[TestFile]> {
        match mode {
            ExecutionMode::PerFile => self.files.chunks(1).collect(),
            ExecutionMode::Suite if self.files.is_empty() => Vec::new(),
            ExecutionMode::Suite => vec![self.files.as_slice()],
        }
    }
}

/// How discovered files are handed to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Load every file into one interpreter process.
    #[default]
    Suite,
    /// One interpreter process per file.
    PerFile,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Suite => write!(f, "suite"),
            ExecutionMode::PerFile => write!(f, "per_file"),
        }
    }
}

/// Options handed to the runner for a single invocation.
///
/// Coverage is carried here rather than in the process environment; the
/// executor decides how to pass it on to each child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Emit per-file progress and ask the test framework for verbose output.
    pub verbose: bool,
    /// Enable interpreter warnings and surface them as diagnostics.
    pub warnings: bool,
    /// Enable coverage collection in the child processes.
    pub coverage: bool,
    /// Single suite process or one process per file.
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl RunConfiguration {
    /// Same configuration with coverage switched on.
    pub fn with_coverage(self) -> Self {
        Self {
            coverage: true,
            ..self
        }
    }
}

/// Lifecycle of one aggregated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Discovering,
    Running,
    Completed { passed: bool },
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::NotStarted => write!(f, "not started"),
            RunPhase::Discovering => write!(f, "discovering"),
            RunPhase::Running => write!(f, "running"),
            RunPhase::Completed { passed: true } => write!(f, "completed (pass)"),
            RunPhase::Completed { passed: false } => write!(f, "completed (fail)"),
        }
    }
}

/// Test counts reported by the test framework's summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub tests: usize,
    pub assertions: usize,
    pub failures: usize,
    pub errors: usize,
    pub skips: usize,
}

impl TestCounts {
    /// Parse a summary line such as
    /// `10 tests, 25 assertions, 1 failures, 0 errors, 0 pendings, 0 omissions, 0 notifications`
    /// or `3 runs, 3 assertions, 0 failures, 0 errors, 0 skips`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut counts = Self::default();
        let mut saw_tests = false;
        let mut saw_assertions = false;

        for part in line.trim().split(',') {
            let mut words = part.split_whitespace();
            let (Some(number), Some(label)) = (words.next(), words.next()) else {
                return None;
            };
            let Ok(n) = number.parse::<usize>() else {
                return None;
            };

            match label.trim_end_matches('s') {
                "test" | "run" => {
                    counts.tests = n;
                    saw_tests = true;
                }
                "assertion" => {
                    counts.assertions = n;
                    saw_assertions = true;
                }
                "failure" => counts.failures = n,
                "error" => counts.errors = n,
                "skip" | "pending" | "omission" => counts.skips += n,
                _ => {}
            }
        }

        (saw_tests && saw_assertions).then_some(counts)
    }

    /// Find the last summary line in captured output.
    pub fn find_in(output: &str) -> Option<Self> {
        output.lines().rev().find_map(Self::parse_line)
    }
}

impl AddAssign for TestCounts {
    fn add_assign(&mut self, other: Self) {
        self.tests += other.tests;
        self.assertions += other.assertions;
        self.failures += other.failures;
        self.errors += other.errors;
        self.skips += other.skips;
    }
}

/// Result of one interpreter invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Passed,
    /// The interpreter exited unsuccessfully.
    Failed { exit_code: Option<i32> },
    /// The interpreter could not be run at all.
    Errored { message: String },
}

impl FileOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, FileOutcome::Passed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Passed => "PASSED",
            FileOutcome::Failed { .. } => "FAILED",
            FileOutcome::Errored { .. } => "ERROR",
        }
    }
}

/// Everything recorded about one interpreter invocation.
///
/// Holds a single file in per-file mode and the whole set in suite mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub files: Vec<TestFile>,
    pub outcome: FileOutcome,
    pub duration_seconds: f64,
    /// Counts parsed from the framework's summary line, if one was printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<TestCounts>,
    /// Interpreter warnings; never affect the outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    /// Combined stdout and stderr of the child process.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

impl BatchResult {
    /// Path of a single-file batch, or the file count of a suite.
    pub fn describe(&self) -> String {
        match self.files.as_slice() {
            [file] => file.path.display().to_string(),
            files => format!("suite of {} files", files.len()),
        }
    }

    /// Short name for progress lines.
    pub fn display_name(&self) -> String {
        match self.files.as_slice() {
            [file] => file.display_name(),
            files => format!("{} files", files.len()),
        }
    }

    /// Origin shared by every file, if there is one.
    pub fn origin(&self) -> Option<TestOrigin> {
        let first = self.files.first()?.origin;
        self.files
            .iter()
            .all(|f| f.origin == first)
            .then_some(first)
    }
}

/// Aggregate over all executed batches.
///
/// `passed`, `failed` and `errored` count interpreter invocations; in suite
/// mode there is at most one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_files: usize,
    pub total_runs: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub warnings: usize,
    pub counts: TestCounts,
    pub duration_seconds: f64,
}

impl RunSummary {
    pub fn from_results(results: &[BatchResult], duration_seconds: f64) -> Self {
        let mut summary = Self {
            total_files: results.iter().map(|r| r.files.len()).sum(),
            total_runs: results.len(),
            duration_seconds,
            ..Self::default()
        };

        for result in results {
            match result.outcome {
                FileOutcome::Passed => summary.passed += 1,
                FileOutcome::Failed { .. } => summary.failed += 1,
                FileOutcome::Errored { .. } => summary.errored += 1,
            }
            summary.warnings += result.diagnostics.len();
            if let Some(counts) = result.counts {
                summary.counts += counts;
            }
        }

        summary
    }

    /// An empty run passes.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}

/// Metadata about one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Task that produced the run (`test`, `coverage`, ...).
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub configuration: RunConfiguration,
    pub plugins_dir: PathBuf,
    pub scripts_dir: PathBuf,
}

/// Complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub summary: RunSummary,
    pub files: Vec<BatchResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: FileOutcome) -> BatchResult {
        BatchResult {
            files: vec![TestFile::new(PathBuf::from(name), TestOrigin::Plugin)],
            outcome,
            duration_seconds: 0.1,
            counts: None,
            diagnostics: Vec::new(),
            output: String::new(),
        }
    }

    #[test]
    fn test_concat_keeps_groups_in_order() {
        let set = TestFileSet::concat(
            vec![PathBuf::from("p/a_test.rb"), PathBuf::from("p/b_test.rb")],
            vec![PathBuf::from("s/a_test.rb")],
        );

        assert_eq!(set.len(), 3);
        assert_eq!(set.count_from(TestOrigin::Plugin), 2);
        assert_eq!(set.count_from(TestOrigin::Script), 1);
        let origins: Vec<_> = set.iter().map(|f| f.origin).collect();
        assert_eq!(
            origins,
            vec![TestOrigin::Plugin, TestOrigin::Plugin, TestOrigin::Script]
        );
    }

    #[test]
    fn test_concat_keeps_duplicates() {
        let set = TestFileSet::concat(
            vec![PathBuf::from("x_test.rb")],
            vec![PathBuf::from("x_test.rb")],
        );
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_batches_by_mode() {
        let set = TestFileSet::concat(
            vec![PathBuf::from("p/a_test.rb"), PathBuf::from("p/b_test.rb")],
            vec![PathBuf::from("s/a_test.rb")],
        );

        let per_file = set.batches(ExecutionMode::PerFile);
        assert_eq!(per_file.len(), 3);
        assert!(per_file.iter().all(|b| b.len() == 1));

        let suite = set.batches(ExecutionMode::Suite);
        assert_eq!(suite.len(), 1);
        assert_eq!(suite[0], set.as_slice());

        assert!(TestFileSet::default().batches(ExecutionMode::Suite).is_empty());
    }

    #[test]
    fn test_batch_describe() {
        let single = result("p/a_test.rb", FileOutcome::Passed);
        assert_eq!(single.describe(), "p/a_test.rb");
        assert_eq!(single.display_name(), "a_test.rb");
        assert_eq!(single.origin(), Some(TestOrigin::Plugin));

        let mut suite = single.clone();
        suite
            .files
            .push(TestFile::new(PathBuf::from("s/z_test.rb"), TestOrigin::Script));
        assert_eq!(suite.describe(), "suite of 2 files");
        assert_eq!(suite.origin(), None);
    }

    #[test]
    fn test_suite_summary_counts_files_and_runs() {
        let mut suite = result("a_test.rb", FileOutcome::Failed { exit_code: Some(1) });
        suite
            .files
            .push(TestFile::new(PathBuf::from("b_test.rb"), TestOrigin::Script));

        let summary = RunSummary::from_results(&[suite], 0.3);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_runs, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_with_coverage() {
        let config = RunConfiguration {
            verbose: true,
            warnings: true,
            coverage: false,
            mode: ExecutionMode::PerFile,
        };
        let covered = config.with_coverage();
        assert!(covered.coverage);
        assert!(covered.verbose && covered.warnings);
        assert_eq!(covered.mode, ExecutionMode::PerFile);
    }

    #[test]
    fn test_parse_test_unit_summary() {
        let counts = TestCounts::parse_line(
            "10 tests, 25 assertions, 1 failures, 0 errors, 2 pendings, 1 omissions, 0 notifications",
        )
        .unwrap();
        assert_eq!(counts.tests, 10);
        assert_eq!(counts.assertions, 25);
        assert_eq!(counts.failures, 1);
        assert_eq!(counts.errors, 0);
        assert_eq!(counts.skips, 3);
    }

    #[test]
    fn test_parse_minitest_summary() {
        let counts = TestCounts::parse_line("3 runs, 4 assertions, 0 failures, 1 errors, 0 skips")
            .unwrap();
        assert_eq!(counts.tests, 3);
        assert_eq!(counts.errors, 1);
    }

    #[test]
    fn test_parse_rejects_other_lines() {
        assert!(TestCounts::parse_line("Loaded suite foo_test").is_none());
        assert!(TestCounts::parse_line("Finished in 0.01 seconds.").is_none());
        assert!(TestCounts::parse_line("").is_none());
        assert!(TestCounts::parse_line("3 apples, 2 pears").is_none());
    }

    #[test]
    fn test_find_in_uses_last_summary() {
        let output = "Started\n1 tests, 1 assertions, 0 failures, 0 errors\n...\n2 tests, 3 assertions, 1 failures, 0 errors\n100% passed\n";
        let counts = TestCounts::find_in(output).unwrap();
        assert_eq!(counts.tests, 2);
        assert_eq!(counts.failures, 1);
    }

    #[test]
    fn test_summary_one_failure_among_ten() {
        let mut results: Vec<_> = (0..9)
            .map(|i| result(&format!("{}_test.rb", i), FileOutcome::Passed))
            .collect();
        results.push(result(
            "9_test.rb",
            FileOutcome::Failed { exit_code: Some(1) },
        ));

        let summary = RunSummary::from_results(&results, 1.0);
        assert_eq!(summary.total_files, 10);
        assert_eq!(summary.passed, 9);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_empty_summary_passes() {
        let summary = RunSummary::from_results(&[], 0.0);
        assert_eq!(summary.total_files, 0);
        assert!(summary.is_success());
    }

    #[test]
    fn test_summary_aggregates_counts_and_warnings() {
        let mut a = result("a_test.rb", FileOutcome::Passed);
        a.counts = Some(TestCounts {
            tests: 2,
            assertions: 5,
            ..TestCounts::default()
        });
        a.diagnostics = vec!["a_test.rb:3: warning: unused variable".to_string()];
        let mut b = result("b_test.rb", FileOutcome::Errored {
            message: "not found".to_string(),
        });
        b.counts = None;

        let summary = RunSummary::from_results(&[a, b], 0.5);
        assert_eq!(summary.counts.tests, 2);
        assert_eq!(summary.counts.assertions, 5);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.errored, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Completed { passed: true }.to_string(), "completed (pass)");
        assert_eq!(RunPhase::Discovering.to_string(), "discovering");
    }
}
