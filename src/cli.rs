//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::pipeline::Task;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// suitegather - aggregate plugin and installer-script tests into one run
///
/// Collects `*test*.rb` files from the plugin test directory and from
/// `<base>/test/installer/scripts`, runs them in order and exits non-zero
/// when any of them fails.
///
/// Examples:
///   suitegather --plugins-dir plugins/test --base-dir . test
///   PLUGINS_TEST_DIR=plugins/test BASE_DIR=. suitegather coverage
///   suitegather --plugins-dir plugins/test --base-dir . list
///   suitegather --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Task to run (defaults to `default`: test, then build)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory searched for plugin test files
    #[arg(long, value_name = "DIR", env = "PLUGINS_TEST_DIR", global = true)]
    pub plugins_dir: Option<PathBuf>,

    /// Base directory; script tests are read from <DIR>/test/installer/scripts
    #[arg(long, value_name = "DIR", env = "BASE_DIR", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .suitegather.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (no per-file progress, errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Interpreter used to run test files (overrides config)
    #[arg(long, value_name = "PROGRAM", global = true)]
    pub interpreter: Option<String>,

    /// Do not pass the interpreter warning flag
    #[arg(long, global = true)]
    pub no_warnings: bool,

    /// Treat a missing test directory as empty instead of an error
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Run each test file in its own interpreter process
    ///
    /// By default all files are loaded into a single process.
    #[arg(long, global = true)]
    pub per_file: bool,

    /// Write a run report to this file (overrides report.output)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Report format: markdown or json (overrides report.format)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Generate a default .suitegather.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Task names.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the aggregated test suite (alias of base-test)
    Test,
    /// Discover and run the aggregated test suite
    #[command(name = "base-test", alias = "base_test")]
    BaseTest,
    /// Run the test suite with coverage collection enabled
    Coverage,
    /// Run the configured build command
    Build,
    /// Run the tests, then the build
    Default,
    /// Print the discovered test files without running them
    List,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Command {
    /// Pipeline task for this command; `None` for `list`.
    pub fn task(&self) -> Option<Task> {
        match self {
            Command::Test => Some(Task::Test),
            Command::BaseTest => Some(Task::BaseTest),
            Command::Coverage => Some(Task::Coverage),
            Command::Build => Some(Task::Build),
            Command::Default => Some(Task::Default),
            Command::List => None,
        }
    }

    /// Whether the command discovers tests.
    pub fn needs_directories(&self) -> bool {
        !matches!(self, Command::Build)
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run; no subcommand means `default`.
    pub fn effective_command(&self) -> Command {
        self.command.unwrap_or(Command::Default)
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if !self.effective_command().needs_directories() {
            return Ok(());
        }

        if self.plugins_dir.is_none() {
            return Err(
                "Plugin test directory not set (use --plugins-dir or PLUGINS_TEST_DIR)".to_string(),
            );
        }

        if self.base_dir.is_none() {
            return Err("Base directory not set (use --base-dir or BASE_DIR)".to_string());
        }

        if let Some(ref interpreter) = self.interpreter {
            if interpreter.trim().is_empty() {
                return Err("Interpreter must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            command: Some(Command::Test),
            plugins_dir: Some(PathBuf::from("plugins")),
            base_dir: Some(PathBuf::from(".")),
            config: None,
            verbose: false,
            quiet: false,
            interpreter: None,
            no_warnings: false,
            lenient: false,
            per_file: false,
            output: None,
            format: None,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::try_parse_from([
            "suitegather",
            "--plugins-dir",
            "p",
            "--base-dir",
            "b",
            "base_test",
        ])
        .unwrap();
        assert_eq!(args.command, Some(Command::BaseTest));

        let args = Args::try_parse_from(["suitegather", "coverage", "--quiet"]).unwrap();
        assert_eq!(args.command, Some(Command::Coverage));
        assert!(args.quiet);
    }

    #[test]
    fn test_parse_execution_and_report_flags() {
        let args = Args::try_parse_from([
            "suitegather",
            "test",
            "--per-file",
            "--format",
            "json",
            "-o",
            "out.json",
        ])
        .unwrap();
        assert!(args.per_file);
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.output, Some(PathBuf::from("out.json")));

        let args = Args::try_parse_from(["suitegather", "test"]).unwrap();
        assert!(!args.per_file);
        assert_eq!(args.format, None);
    }

    #[test]
    fn test_no_subcommand_is_default() {
        let mut args = make_args();
        args.command = None;
        assert_eq!(args.effective_command(), Command::Default);
        assert_eq!(args.effective_command().task(), Some(Task::Default));
    }

    #[test]
    fn test_command_tasks() {
        assert_eq!(Command::Test.task(), Some(Task::Test));
        assert_eq!(Command::Coverage.task(), Some(Task::Coverage));
        assert_eq!(Command::List.task(), None);
    }

    #[test]
    fn test_validation_missing_directories() {
        let mut args = make_args();
        args.plugins_dir = None;
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.base_dir = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_build_needs_no_directories() {
        let mut args = make_args();
        args.command = Some(Command::Build);
        args.plugins_dir = None;
        args.base_dir = None;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
