//! Vigil CLI - Is It Up?
//!
//! Run protocol tests against remote services and report which are reachable.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use humantime_serde::re::humantime;
use vigil::config::Config;
use vigil::protocols::{Arguments, DEFAULT_TIMEOUT, Dispatcher, TestOptions, TestReport};

/// Vigil - pluggable reachability tests
#[derive(Debug, Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single protocol test
    Probe {
        /// Protocol name (e.g. tcp)
        protocol: String,

        /// Host name or address to test
        target: String,

        /// Protocol argument as key=value (repeatable)
        #[arg(short, long = "arg", value_parser = parse_argument)]
        arguments: Vec<(String, String)>,

        /// Timeout for the test
        #[arg(short, long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run every test in a plan file
    Run {
        /// Path to test plan file
        #[arg(short, long, default_value = "vigil.yaml")]
        config: String,

        /// Only run tests for these protocols (comma-separated)
        #[arg(short, long)]
        protocols: Option<String>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Generate a default test plan file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "vigil.yaml")]
        output: String,
    },

    /// List available protocols
    List,

    /// Validate a test plan file
    Validate {
        /// Path to test plan file
        #[arg(short, long, default_value = "vigil.yaml")]
        config: String,
    },
}

/// Parse a `key=value` argument
fn parse_argument(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("missing argument name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn setup_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.json);

    let dispatcher = Dispatcher::default();

    match cli.command {
        Commands::Probe {
            protocol,
            target,
            arguments,
            timeout,
            format,
        } => {
            let arguments: Arguments = arguments.into_iter().collect();
            let opts = TestOptions::with_timeout(timeout.unwrap_or(DEFAULT_TIMEOUT));
            probe(&dispatcher, &protocol, &target, &arguments, &opts, format).await
        }

        Commands::Run {
            config: config_path,
            protocols,
            format,
        } => run_plan(&dispatcher, &config_path, protocols.as_deref(), format).await,

        Commands::Init { output } => init_config(&output),

        Commands::List => {
            list_protocols(&dispatcher);
            Ok(())
        }

        Commands::Validate {
            config: config_path,
        } => validate_config(&dispatcher, &config_path),
    }
}

/// Print a single report in the chosen format
fn print_report(report: &TestReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(report).context("Failed to serialize report")?;
            println!("{json}");
        }
        OutputFormat::Text => match &report.error {
            None => println!("PASS  {} ({:?})", report.input(), report.duration),
            Some(error) => println!("FAIL  {}: {error}", report.input()),
        },
    }
    Ok(())
}

/// Run one test given on the command line
async fn probe(
    dispatcher: &Dispatcher,
    protocol: &str,
    target: &str,
    arguments: &Arguments,
    opts: &TestOptions,
    format: OutputFormat,
) -> Result<()> {
    let report = dispatcher.report(protocol, target, arguments, opts).await;
    print_report(&report, format)?;

    if report.passed {
        Ok(())
    } else {
        anyhow::bail!("{} failed", report.input())
    }
}

/// Run every test in a plan, one after another
async fn run_plan(
    dispatcher: &Dispatcher,
    config_path: &str,
    protocol_filter: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    tracing::info!(config = %config_path, "Loading test plan");

    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load test plan from {config_path}"))?;

    config
        .validate(dispatcher)
        .context("Test plan failed validation")?;

    let filter: Option<Vec<&str>> =
        protocol_filter.map(|f| f.split(',').map(str::trim).collect());
    let tests: Vec<_> = match &filter {
        Some(protocols) => config.tests_for(protocols).collect(),
        None => config.tests.iter().collect(),
    };

    if tests.is_empty() {
        tracing::warn!("No tests to run");
        return Ok(());
    }

    tracing::info!(count = tests.len(), "Running tests");

    let mut failed = 0usize;
    for test in &tests {
        let opts = test.options(&config.defaults);
        let report = dispatcher
            .report(&test.protocol, &test.target, &test.arguments, &opts)
            .await;

        if report.passed {
            tracing::debug!(
                test = %report.input(),
                duration_ms = report.duration.as_millis(),
                "Test passed"
            );
        } else {
            tracing::warn!(
                test = %report.input(),
                error = ?report.error,
                "Test failed"
            );
            failed += 1;
        }

        print_report(&report, format)?;
    }

    if failed == 0 {
        tracing::info!(count = tests.len(), "All tests PASSED");
        Ok(())
    } else {
        tracing::error!(failed, count = tests.len(), "Some tests FAILED");
        anyhow::bail!("{failed} of {} tests FAILED", tests.len())
    }
}

/// Generate a default test plan file
fn init_config(output: &str) -> Result<()> {
    let config = Config::default_config();
    let yaml = config.to_yaml().context("Failed to serialize config")?;

    std::fs::write(output, &yaml).with_context(|| format!("Failed to write config to {output}"))?;

    tracing::info!(path = %output, "Test plan created");
    println!("Created {output}");
    println!();
    println!("Edit the file to list your services, then run:");
    println!("  vigil run --config {output}");

    Ok(())
}

/// List available protocols
fn list_protocols(dispatcher: &Dispatcher) {
    println!("Available protocols:");
    println!();

    for name in dispatcher.registry().names() {
        let Ok(test) = dispatcher.resolve(name) else {
            continue;
        };
        println!("  {name:20} - {}", test.description());
        let schema = test.arguments();
        for (argument, pattern) in schema.patterns() {
            let required = if schema.is_required(argument) {
                " (required)"
            } else {
                ""
            };
            println!("  {:20}   {argument}: {pattern}{required}", "");
        }
    }

    println!();
    println!("Run a single test with:");
    println!("  vigil probe tcp example.com --arg port=443");
}

/// Validate a test plan file
fn validate_config(dispatcher: &Dispatcher, config_path: &str) -> Result<()> {
    tracing::info!(config = %config_path, "Validating test plan");

    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load test plan from {config_path}"))?;

    config
        .validate(dispatcher)
        .context("Test plan failed validation")?;

    println!("Test plan is valid!");
    println!();
    println!("Default timeout: {:?}", config.defaults.timeout);
    println!("Tests: {}", config.tests.len());

    for test in &config.tests {
        let opts = test.options(&config.defaults);
        println!("  - {} (timeout {:?})", test.input(), opts.timeout);
    }

    Ok(())
}
