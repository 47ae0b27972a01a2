//! # Timed Batch CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 合成负载驱动批处理块
//! - 优雅关闭处理

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use config_loader::ConfigLoader;
use commands::{run_validate, run_workload};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Timed Batch CLI starting"
    );

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_workload(args).await,
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// The level falls back to `[observability] log_level` from the command's
/// configuration file when neither `-v` nor `-q` is given. RUST_LOG still
/// takes precedence over both.
fn init_logging(cli: &Cli) -> Result<()> {
    let file_level = configured_log_level(cli);
    let default_level = resolve_log_level(cli, file_level.as_deref());

    observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_level,
    })
}

/// Log level from the configuration file, if it loads.
///
/// Load errors are reported later by the command itself.
fn configured_log_level(cli: &Cli) -> Option<String> {
    let path = cli.config_path()?;
    ConfigLoader::load_from_path(path)
        .ok()?
        .observability
        .log_level
}

fn resolve_log_level(cli: &Cli, file_level: Option<&str>) -> String {
    if cli.quiet {
        return "warn".to_string();
    }
    match cli.verbose {
        0 => file_level.unwrap_or("info").to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const WITH_DEBUG: &str = "[batch]\nbatch_size = 10\nbatch_timeout_ms = 2000\nthread_timeout_ms = 22000\n\n[observability]\nlog_level = \"debug\"\n";

    #[test]
    fn test_file_log_level_used_without_flags() {
        let file = config_file(WITH_DEBUG);
        let path = file.path().to_str().unwrap();

        let cli = Cli::try_parse_from(["timed-batch", "run", "--config", path]).unwrap();
        let file_level = configured_log_level(&cli);
        assert_eq!(file_level.as_deref(), Some("debug"));
        assert_eq!(resolve_log_level(&cli, file_level.as_deref()), "debug");

        let cli = Cli::try_parse_from(["timed-batch", "validate", "--config", path]).unwrap();
        assert_eq!(configured_log_level(&cli).as_deref(), Some("debug"));
    }

    #[test]
    fn test_flags_override_file_log_level() {
        let file = config_file(WITH_DEBUG);
        let path = file.path().to_str().unwrap();

        let quiet = Cli::try_parse_from(["timed-batch", "-q", "run", "-c", path]).unwrap();
        assert_eq!(resolve_log_level(&quiet, Some("debug")), "warn");

        let verbose = Cli::try_parse_from(["timed-batch", "-vv", "run", "-c", path]).unwrap();
        assert_eq!(resolve_log_level(&verbose, Some("debug")), "trace");
    }

    #[test]
    fn test_missing_or_invalid_file_falls_back_to_info() {
        let cli = Cli::try_parse_from(["timed-batch", "run"]).unwrap();
        assert_eq!(configured_log_level(&cli), None);
        assert_eq!(resolve_log_level(&cli, None), "info");

        let broken = config_file("[batch]\nbatch_size = 0\n");
        let cli = Cli::try_parse_from([
            "timed-batch",
            "validate",
            "--config",
            broken.path().to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(configured_log_level(&cli), None);
    }
}
