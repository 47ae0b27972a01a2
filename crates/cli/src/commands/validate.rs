//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::{BatchFileConfig, ConfigLoader, TimedBatchConfig};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    batch_size: usize,
    batch_timeout_ms: u64,
    thread_timeout_ms: u64,
    max_in_flight_batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match ConfigLoader::load_from_path(&args.config) {
        Ok(file) => {
            let warnings = collect_warnings(&file);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    batch_size: file.batch.batch_size,
                    batch_timeout_ms: file.batch.batch_timeout_ms,
                    thread_timeout_ms: file.batch.thread_timeout_ms,
                    max_in_flight_batches: file.batch.max_in_flight_batches,
                    metrics_port: file.observability.metrics_port,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(file: &BatchFileConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let batch = &file.batch;

    let recommended =
        TimedBatchConfig::recommended_thread_timeout(batch.batch_size, batch.batch_timeout_ms);
    if batch.thread_timeout_ms < recommended {
        warnings.push(format!(
            "thread_timeout_ms ({}) is below batch_size * batch_timeout_ms + batch_timeout_ms ({}) - \
             slowly filling batches may time out",
            batch.thread_timeout_ms, recommended
        ));
    }

    if batch.batch_size == 1 {
        warnings.push("batch_size is 1 - every item is handled on its own".to_string());
    }

    if batch.max_in_flight_batches > 1 {
        warnings.push(format!(
            "max_in_flight_batches is {} - batches may complete out of order",
            batch.max_in_flight_batches
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Batch size: {}", summary.batch_size);
            println!("  Batch timeout: {}ms", summary.batch_timeout_ms);
            println!("  Thread timeout: {}ms", summary.thread_timeout_ms);
            println!("  Max in-flight batches: {}", summary.max_in_flight_batches);
            if let Some(port) = summary.metrics_port {
                println!("  Metrics port: {}", port);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
