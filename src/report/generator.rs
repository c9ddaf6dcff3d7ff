//! Run report generation.
//!
//! This module renders a [`RunReport`] as Markdown or JSON.

use crate::models::{BatchResult, FileOutcome, RunMetadata, RunReport, RunSummary};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report. `include_output` adds the captured
/// output of failing runs.
pub fn generate_markdown_report(report: &RunReport, include_output: bool) -> String {
    let mut output = String::new();

    output.push_str("# Test Run Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_files_section(&report.files));
    output.push_str(&generate_failures_section(&report.files, include_output));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Task:** `{}`\n", metadata.task));
    section.push_str(&format!(
        "- **Started:** {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Plugin tests:** `{}`\n",
        metadata.plugins_dir.display()
    ));
    section.push_str(&format!(
        "- **Script tests:** `{}`\n",
        metadata.scripts_dir.display()
    ));
    section.push_str(&format!(
        "- **Mode:** {} | **Verbose:** {} | **Warnings:** {} | **Coverage:** {}\n",
        metadata.configuration.mode,
        metadata.configuration.verbose,
        metadata.configuration.warnings,
        metadata.configuration.coverage
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &RunSummary) -> String {
    let mut section = String::new();
    let verdict = if summary.is_success() {
        "✅ PASS"
    } else {
        "❌ FAIL"
    };

    section.push_str("## Summary\n\n");
    section.push_str(&format!("**Result:** {}\n\n", verdict));
    section.push_str("| Files | Runs | Passed | Failed | Errored | Warnings | Duration |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | {:.2}s |\n\n",
        summary.total_files,
        summary.total_runs,
        summary.passed,
        summary.failed,
        summary.errored,
        summary.warnings,
        summary.duration_seconds
    ));

    if summary.counts.tests > 0 {
        section.push_str(&format!(
            "{} tests, {} assertions, {} failures, {} errors, {} skips\n\n",
            summary.counts.tests,
            summary.counts.assertions,
            summary.counts.failures,
            summary.counts.errors,
            summary.counts.skips
        ));
    }

    section
}

/// Generate the run table, in run order. Suite runs also list their files.
fn generate_files_section(results: &[BatchResult]) -> String {
    let mut section = String::new();

    section.push_str("## Runs\n\n");

    if results.is_empty() {
        section.push_str("No test files matched.\n\n");
        return section;
    }

    section.push_str("| # | Files | Group | Result | Tests | Duration |\n");
    section.push_str("|---:|:---|:---|:---:|:---:|---:|\n");

    for (i, result) in results.iter().enumerate() {
        let tests = result
            .counts
            .map(|c| c.tests.to_string())
            .unwrap_or_else(|| "-".to_string());
        let group = result
            .origin()
            .map(|o| o.to_string())
            .unwrap_or_else(|| "plugin, script".to_string());

        section.push_str(&format!(
            "| {} | `{}` | {} | {} | {} | {:.2}s |\n",
            i + 1,
            result.describe(),
            group,
            result.outcome.label(),
            tests,
            result.duration_seconds
        ));
    }
    section.push('\n');

    for (i, result) in results.iter().enumerate() {
        if result.files.len() < 2 {
            continue;
        }
        section.push_str(&format!("Run {} loaded, in order:\n\n", i + 1));
        for file in &result.files {
            section.push_str(&format!("1. `{}` ({})\n", file.path.display(), file.origin));
        }
        section.push('\n');
    }

    section
}

/// Generate details for failed and errored runs, plus warnings.
fn generate_failures_section(results: &[BatchResult], include_output: bool) -> String {
    let problem_files: Vec<_> = results
        .iter()
        .filter(|f| !f.outcome.is_pass() || !f.diagnostics.is_empty())
        .collect();

    if problem_files.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Details\n\n");

    for file in problem_files {
        section.push_str(&format!("### `{}`\n\n", file.describe()));

        match file.outcome {
            FileOutcome::Passed => {}
            FileOutcome::Failed { exit_code } => {
                let code = exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                section.push_str(&format!("**Exit code:** {}\n\n", code));
            }
            FileOutcome::Errored { ref message } => {
                section.push_str(&format!("**Error:** {}\n\n", message));
            }
        }

        if !file.diagnostics.is_empty() {
            section.push_str("**Warnings:**\n\n");
            for warning in &file.diagnostics {
                section.push_str(&format!("- `{}`\n", warning));
            }
            section.push('\n');
        }

        if include_output && !file.outcome.is_pass() && !file.output.is_empty() {
            section.push_str("<details>\n<summary>Output</summary>\n\n```\n");
            section.push_str(file.output.trim_end());
            section.push_str("\n```\n</details>\n\n");
        }
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by suitegather v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write the rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
