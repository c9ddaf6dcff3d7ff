//! suitegather - test aggregator and runner
//!
//! Discovers plugin and installer-script test files, runs them as one
//! ordered suite (optionally with coverage enabled) and chains an external
//! build step for the default task.
//!
//! Exit codes:
//!   0 - All tests passed (including when no test files matched)
//!   1 - Runtime error (missing directory, coverage setup, build failure, etc.)
//!   2 - At least one test file failed

mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod runner;
mod scanner;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use models::{RunReport, TestOrigin};
use pipeline::{Pipeline, PipelineOutcome, StepStatus};
use runner::{ConsoleReporter, ProcessExecutor};
use scanner::{DiscoveryRoots, TestScanner};
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("suitegather v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .suitegather.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the interpreter, file pattern and build command.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected command. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args, Path::new(CONFIG_FILE))?;
    config.merge_with_args(&args);

    let command = args.effective_command();
    let roots = discovery_roots(&args, &config);

    let Some(task) = command.task() else {
        return handle_list(&config, roots.as_ref());
    };

    // Read once here; the runner itself never looks at the environment.
    let preset_coverage = std::env::var(&config.coverage.env_var).ok();
    if preset_coverage.is_some() && !config.coverage.honor_env {
        debug!(
            "{} is set in the environment; ignored unless coverage.honor_env is enabled",
            config.coverage.env_var
        );
    }

    let executor = ProcessExecutor::from_config(&config);
    let reporter = ConsoleReporter::new(config.runner.verbose);
    let mut pipeline = Pipeline::new(&config, roots, executor, reporter, preset_coverage);

    let outcome = pipeline.run_task(task).await?;
    debug!("Final phase: {}", pipeline.phase());

    if let Some(ref report) = outcome.report {
        if let Some(ref output) = config.report.output {
            save_report(report, &config, output)?;
        }
    }

    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &PipelineOutcome) -> i32 {
    if outcome.is_success() {
        for record in &outcome.steps {
            if record.status == StepStatus::Skipped {
                println!("⏭️  Skipped step: {}", record.step.name());
            }
        }
        println!("\n✅ Task `{}` complete.", outcome.task);
        0
    } else {
        eprintln!("\n⛔ Task `{}` failed: test failures (exit code 2).", outcome.task);
        2
    }
}

fn discovery_roots(args: &Args, config: &Config) -> Option<DiscoveryRoots> {
    match (&args.plugins_dir, &args.base_dir) {
        (Some(plugins), Some(base)) => Some(DiscoveryRoots::new(
            plugins,
            base,
            &config.discovery.scripts_subdir,
        )),
        _ => None,
    }
}

/// Handle `list`: discover test files, print them, exit.
fn handle_list(config: &Config, roots: Option<&DiscoveryRoots>) -> Result<i32> {
    let roots = roots.context("Both --plugins-dir and --base-dir are required")?;
    let scanner = TestScanner::new(config.test_file_pattern(), config.discovery.strict);
    let files = scanner.discover(roots)?;

    if files.is_empty() {
        println!("No matching test files found.");
        return Ok(0);
    }

    for file in files.iter() {
        let marker = match file.origin {
            TestOrigin::Plugin => "🔌",
            TestOrigin::Script => "📜",
        };
        println!("{} {}", marker, file.path.display());
    }
    println!(
        "\nTotal: {} files ({} plugin, {} script)",
        files.len(),
        files.count_from(TestOrigin::Plugin),
        files.count_from(TestOrigin::Script)
    );

    Ok(0)
}

fn save_report(report: &RunReport, config: &Config, path: &Path) -> Result<()> {
    let content = match config.report.format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(report, config.report.include_output)
        }
    };

    report::write_report(&content, path)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    println!("📝 Report saved to: {}", path.display());
    Ok(())
}

/// Load configuration from `--config`, or from `default_path` when it exists.
///
/// A config file that exists but does not parse is an error.
fn load_config(args: &Args, default_path: &Path) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_optional(default_path)? {
        Some(config) => {
            info!("Loaded default config from {}", default_path.display());
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
