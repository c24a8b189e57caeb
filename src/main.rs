//! FlowBatch CLI Entry Point
//!
//! Provides command-line interface for launching jobs.
//!
//! # Usage
//!
//! ```bash
//! # Run a built-in sample job
//! flowbatch deliverPackageJob item=shoes run.date=2024-05-01
//!
//! # Run a job from a definitions file
//! flowbatch --definitions definitions/delivery.yaml prepareFlowersJob type=roses
//!
//! # List available jobs
//! flowbatch --list
//!
//! # Show a timeline chart and keep no history
//! flowbatch billingJob --timeline --no-history
//! ```

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};

use flowbatch::execution::history::HISTORY_DIR;
use flowbatch::execution::{Engine, JobLauncher, JobRunResult, JsonFileHistory};
use flowbatch::jobs::{self, JobsConfig};
use flowbatch::monitoring::render_gantt;
use flowbatch::workflow::{load_definitions, ActionRegistry, JobRegistry, TerminalStatus};
use flowbatch::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    job_name: Option<String>,
    parameters: HashMap<String, String>,
    definitions: Option<String>,
    history_dir: Option<PathBuf>,
    no_history: bool,
    max_visits: Option<usize>,
    timeline: bool,
    list: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Batch Flow Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: flowbatch [OPTIONS] <JOB_NAME> [key=value ...]");
    println!();
    println!("Arguments:");
    println!("  <JOB_NAME>            Name of the job to launch");
    println!("  [key=value ...]       Job parameters");
    println!();
    println!("Options:");
    println!("  --definitions FILE    Load jobs from a YAML definitions file");
    println!("  --history-dir DIR     Directory for run history (default: {})", HISTORY_DIR.display());
    println!("  --no-history          Do not record run history");
    println!("  --max-visits N        Node execution limit per run, 0 for none");
    println!("  --timeline            Print a timeline chart after the run");
    println!("  --list                List available jobs and exit");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Examples:");
    println!("  flowbatch deliverPackageJob item=shoes run.date=2024-05-01");
    println!("  flowbatch prepareFlowersJob type=roses --timeline");
}

/// Returns the value following option `name`.
fn option_value<'a>(args: &'a [String], i: &mut usize, name: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", name))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => config.verbose = true,
            "--no-history" => config.no_history = true,
            "--timeline" => config.timeline = true,
            "--list" => config.list = true,
            "--definitions" => {
                config.definitions = Some(option_value(args, &mut i, "--definitions")?.to_string());
            }
            "--history-dir" => {
                config.history_dir = Some(PathBuf::from(option_value(args, &mut i, "--history-dir")?));
            }
            "--max-visits" => {
                let value = option_value(args, &mut i, "--max-visits")?;
                let max: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid max-visits value: {}", value))?;
                config.max_visits = Some(max);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg if config.job_name.is_none() => {
                config.job_name = Some(arg.to_string());
            }
            arg => {
                let (key, value) = arg
                    .split_once('=')
                    .ok_or_else(|| format!("Expected key=value parameter, got: {}", arg))?;
                if key.trim().is_empty() {
                    return Err(format!("Parameter without a name: {}", arg));
                }
                config
                    .parameters
                    .insert(key.trim().to_string(), value.to_string());
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Loads jobs from the definitions file, or the built-in samples.
fn load_jobs(config: &Config) -> Result<JobRegistry, Box<dyn std::error::Error>> {
    let jobs_config = JobsConfig::default();

    match &config.definitions {
        Some(path) => {
            let mut actions = ActionRegistry::new();
            jobs::register_actions(&mut actions, &jobs_config);
            load_definitions(path, &actions)
        }
        None => Ok(jobs::registry(&jobs_config)?),
    }
}

/// Prints every job with its parameter contract.
fn print_jobs(registry: &JobRegistry) {
    println!("Available jobs:");
    for job in registry.jobs() {
        let params: Vec<String> = job
            .parameters()
            .iter()
            .map(|p| {
                if p.required {
                    format!("{}:{}", p.name, p.kind)
                } else {
                    format!("[{}:{}]", p.name, p.kind)
                }
            })
            .collect();
        println!("  {:24} {}", job.name().bold(), params.join(" "));
    }
}

/// Prints the outcome of a run.
fn print_summary(run: &JobRunResult) {
    let status = match &run.status {
        TerminalStatus::Completed => run.status.to_string().green().bold(),
        TerminalStatus::Failed => run.status.to_string().red().bold(),
        _ => run.status.to_string().yellow().bold(),
    };

    println!();
    println!("Job:      {}", run.job_name);
    println!("Run:      {}", run.run_id);
    println!("Status:   {}", status);
    println!("Duration: {} ms", run.duration_ms());
    println!("Steps:    {}", run.steps_executed().join(" -> "));

    if let Some(detail) = &run.error {
        println!("Error:    {}", detail.to_string().red());
    }
}

/// Main application entry point.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    let registry = load_jobs(&config).map_err(|e| {
        error!("Failed to load jobs: {}", e);
        e
    })?;

    if config.list {
        print_jobs(&registry);
        return Ok(true);
    }

    let Some(job_name) = config.job_name.clone() else {
        print_usage();
        return Err("No job name given".into());
    };

    print_banner();

    let mut engine = Engine::new();
    if let Some(max) = config.max_visits {
        // Zero lifts the limit
        engine.set_max_node_visits(if max == 0 { None } else { Some(max) });
    }

    let mut launcher = JobLauncher::new(registry);
    launcher.set_engine(engine);

    if !config.no_history {
        let history = match &config.history_dir {
            Some(dir) => JsonFileHistory::new(dir),
            None => JsonFileHistory::default_location(),
        };
        info!("Run history: {}", history.root().display());
        launcher = launcher.with_history(Arc::new(history));
    }

    let run = launcher.launch(&job_name, config.parameters.clone())?;

    print_summary(&run);

    if config.timeline {
        println!("{}", render_gantt(&run.timings, run.started_at, run.finished_at));
    }

    Ok(run.status == TerminalStatus::Completed)
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
