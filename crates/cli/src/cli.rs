//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// Timed Batch - drive a debounced batching block with a synthetic workload
#[derive(Parser, Debug)]
#[command(
    name = "timed-batch",
    author,
    version,
    about = "Debounced, size-capped batching of concurrent work items",
    long_about = "Submits synthetic records from many concurrent callers into a timed batch block.\n\n\
                  Batches flush when they reach the batch size or after the inactivity \n\
                  timeout; each caller waits until its batch is handled or its own \n\
                  thread timeout elapses."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TIMED_BATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TIMED_BATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a synthetic workload through a batch block
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults are used when absent
    #[arg(short, long, env = "TIMED_BATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of records to submit
    #[arg(long, default_value = "95", env = "TIMED_BATCH_ITEMS")]
    pub items: u64,

    /// Override batch size from configuration
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override inactivity timeout (ms) from configuration
    #[arg(long)]
    pub batch_timeout_ms: Option<u64>,

    /// Override per-item thread timeout (ms) from configuration
    #[arg(long)]
    pub thread_timeout_ms: Option<u64>,

    /// Override number of batches handled concurrently
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Delay between two submissions in milliseconds
    #[arg(long, default_value = "0")]
    pub spacing_ms: u64,

    /// Simulated handler latency per batch in milliseconds
    #[arg(long, default_value = "1")]
    pub handler_latency_ms: u64,

    /// Probability that the handler fails a batch (0.0 - 1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_probability)]
    pub failure_rate: f64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = use configuration / disabled)
    #[arg(long, default_value = "0", env = "TIMED_BATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "batch.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|e| format!("'{raw}' is not a number: {e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not within 0.0..=1.0"))
    }
}

impl Cli {
    /// Configuration file named by the selected command, if any
    pub fn config_path(&self) -> Option<&Path> {
        match &self.command {
            Commands::Run(args) => args.config.as_deref(),
            Commands::Validate(args) => Some(args.config.as_path()),
        }
    }
}
