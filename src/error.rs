//! Error types for discovery, coverage setup and the build step.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the aggregator.
///
/// Test failures are not errors: they are reported through the run summary
/// and mapped to an exit code by the caller.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("test directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read directory {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("task `{0}` needs both a plugin test directory and a base directory")]
    RootsNotConfigured(String),

    #[error("coverage setup failed: {0}")]
    CoverageSetup(String),

    #[error("failed to launch build command `{command}`: {source}")]
    BuildNotLaunched {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build command `{command}` exited with {status}")]
    BuildFailed { command: String, status: String },
}

pub type SuiteResult<T> = Result<T, SuiteError>;
