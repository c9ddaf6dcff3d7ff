//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.suitegather.toml` files.

use crate::cli::OutputFormat;
use crate::models::{ExecutionMode, RunConfiguration};
use crate::scanner::TestFilePattern;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".suitegather.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Test discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Test execution settings.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Coverage settings.
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// External build step.
    #[serde(default)]
    pub build: BuildConfig,

    /// Run report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Test discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Substring a file name must contain.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Test file extension (without dot).
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Path below the base directory holding installer-script tests.
    #[serde(default = "default_scripts_subdir")]
    pub scripts_subdir: String,

    /// Fail when a configured directory is missing.
    /// If false, a missing directory contributes no files.
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            extension: default_extension(),
            scripts_subdir: default_scripts_subdir(),
            strict: true,
        }
    }
}

fn default_pattern() -> String {
    "test".to_string()
}

fn default_extension() -> String {
    "rb".to_string()
}

fn default_scripts_subdir() -> String {
    "test/installer/scripts".to_string()
}

fn default_true() -> bool {
    true
}

/// Test execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Interpreter used to run each test file.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Directories added to the interpreter's load path.
    #[serde(default = "default_libs")]
    pub libs: Vec<String>,

    /// Interpreter flag enabling warnings. Empty passes no flag.
    #[serde(default = "default_warnings_flag")]
    pub warnings_flag: String,

    /// Test framework flag enabling verbose output. Empty passes no flag.
    #[serde(default = "default_verbose_flag")]
    pub verbose_flag: String,

    /// `suite` loads every file into one process, `per_file` runs each
    /// file in its own process.
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Interpreter arguments placed before the file list in suite mode.
    /// The loader must load every file argument and leave the remaining
    /// options for the test framework.
    #[serde(default = "default_suite_loader")]
    pub suite_loader: Vec<String>,

    /// Per-file progress and verbose framework output.
    #[serde(default = "default_true")]
    pub verbose: bool,

    /// Interpreter warnings surfaced as diagnostics.
    #[serde(default = "default_true")]
    pub warnings: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            libs: default_libs(),
            warnings_flag: default_warnings_flag(),
            verbose_flag: default_verbose_flag(),
            mode: ExecutionMode::default(),
            suite_loader: default_suite_loader(),
            verbose: true,
            warnings: true,
        }
    }
}

fn default_interpreter() -> String {
    "ruby".to_string()
}

fn default_libs() -> Vec<String> {
    vec!["lib".to_string()]
}

fn default_warnings_flag() -> String {
    "-w".to_string()
}

fn default_verbose_flag() -> String {
    "--verbose".to_string()
}

fn default_suite_loader() -> Vec<String> {
    vec![
        "-e".to_string(),
        "tests, opts = ARGV.partition { |arg| !arg.start_with?(\"-\") }; \
         ARGV.replace(opts); \
         tests.each { |path| require File.expand_path(path) }"
            .to_string(),
    ]
}

/// Coverage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Environment variable read by the coverage tool.
    #[serde(default = "default_coverage_var")]
    pub env_var: String,

    /// Value that switches coverage on.
    #[serde(default = "default_coverage_value")]
    pub env_value: String,

    /// Let a value already present in the environment enable coverage for
    /// plain test runs. Off by default: only the `coverage` task enables it.
    #[serde(default)]
    pub honor_env: bool,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            env_var: default_coverage_var(),
            env_value: default_coverage_value(),
            honor_env: false,
        }
    }
}

fn default_coverage_var() -> String {
    "SIMPLE_COV".to_string()
}

fn default_coverage_value() -> String {
    "1".to_string()
}

/// External build step run by the default task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Program and arguments, e.g. `["rake", "build"]`. Empty skips the step.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Run report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Write a report here after each test run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Report format (`markdown` or `json`).
    #[serde(default)]
    pub format: OutputFormat,

    /// Include captured output of failing runs in Markdown reports.
    #[serde(default = "default_true")]
    pub include_output: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: None,
            format: OutputFormat::default(),
            include_output: true,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if it exists.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref interpreter) = args.interpreter {
            self.runner.interpreter = interpreter.clone();
        }

        if args.no_warnings {
            self.runner.warnings = false;
        }

        if args.quiet {
            self.runner.verbose = false;
        }

        if args.lenient {
            self.discovery.strict = false;
        }

        if args.per_file {
            self.runner.mode = ExecutionMode::PerFile;
        }

        if let Some(ref output) = args.output {
            self.report.output = Some(output.clone());
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
    }

    /// The `isTestFile` predicate described by the discovery settings.
    pub fn test_file_pattern(&self) -> TestFilePattern {
        TestFilePattern::new(&self.discovery.pattern, &self.discovery.extension)
    }

    /// Run configuration for a plain test run.
    ///
    /// `preset_coverage` is the value of the coverage variable already in the
    /// environment; it only matters when `coverage.honor_env` is set.
    pub fn run_configuration(&self, preset_coverage: Option<&str>) -> RunConfiguration {
        let coverage = self.coverage.honor_env
            && preset_coverage.is_some_and(|v| v == self.coverage.env_value);

        RunConfiguration {
            verbose: self.runner.verbose,
            warnings: self.runner.warnings,
            coverage,
            mode: self.runner.mode,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
