//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use config_loader::{BatchFileConfig, ConfigLoader};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_workload(args: &RunArgs) -> Result<()> {
    let file = load_config(args)?;
    let mut batch = file.batch;

    // Apply CLI overrides
    if let Some(batch_size) = args.batch_size {
        info!(batch_size, "Overriding batch size from CLI");
        batch.batch_size = batch_size;
    }
    if let Some(batch_timeout_ms) = args.batch_timeout_ms {
        info!(batch_timeout_ms, "Overriding batch timeout from CLI");
        batch.batch_timeout_ms = batch_timeout_ms;
    }
    if let Some(thread_timeout_ms) = args.thread_timeout_ms {
        info!(thread_timeout_ms, "Overriding thread timeout from CLI");
        batch.thread_timeout_ms = thread_timeout_ms;
    }
    if let Some(max_in_flight) = args.max_in_flight {
        info!(max_in_flight, "Overriding max in-flight batches from CLI");
        batch.max_in_flight_batches = max_in_flight;
    }
    batch
        .ensure_valid()
        .context("Invalid configuration after applying CLI overrides")?;

    info!(
        batch_size = batch.batch_size,
        batch_timeout_ms = batch.batch_timeout_ms,
        thread_timeout_ms = batch.thread_timeout_ms,
        max_in_flight = batch.max_in_flight_batches,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&batch);
        return Ok(());
    }

    let metrics_port = match args.metrics_port {
        0 => file.observability.metrics_port,
        port => Some(port),
    };

    let pipeline_config = PipelineConfig {
        batch,
        items: args.items,
        spacing: Duration::from_millis(args.spacing_ms),
        handler_latency: Duration::from_millis(args.handler_latency_ms),
        failure_rate: args.failure_rate,
        metrics_port,
    };

    let pipeline = Pipeline::new(pipeline_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting workload...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Workload execution failed")?;
            info!(
                succeeded = stats.succeeded,
                timed_out = stats.timed_out,
                batches = stats.dispatch.batches_dispatched,
                duration_secs = stats.duration.as_secs_f64(),
                "Workload completed"
            );

            // Print detailed statistics
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping workload...");
        }
    }

    info!("Timed Batch finished");
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<BatchFileConfig> {
    match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(BatchFileConfig::default())
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(batch: &contracts::TimedBatchConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Batching:");
    println!("  Batch size: {}", batch.batch_size);
    println!("  Batch timeout: {}ms", batch.batch_timeout_ms);
    println!("  Thread timeout: {}ms", batch.thread_timeout_ms);
    println!("  Max in-flight batches: {}", batch.max_in_flight_batches);

    let recommended =
        contracts::TimedBatchConfig::recommended_thread_timeout(batch.batch_size, batch.batch_timeout_ms);
    if batch.thread_timeout_ms < recommended {
        println!(
            "\n  Note: a full batch of slow arrivals needs up to {recommended}ms; \
             items may time out before their batch is handled"
        );
    }

    println!();
}
