//! 配置校验模块
//!
//! 校验规则：
//! - batch_size / 超时 / 并发批次数 > 0
//! - thread_timeout_ms > batch_timeout_ms
//! - metrics_port 不为 0
//! - log_level 为已知级别

use contracts::ContractError;

use crate::{BatchFileConfig, ObservabilitySection};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 校验配置文件
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &BatchFileConfig) -> Result<(), ContractError> {
    config.batch.ensure_valid()?;
    validate_observability(&config.observability)?;
    Ok(())
}

fn validate_observability(section: &ObservabilitySection) -> Result<(), ContractError> {
    if section.metrics_port == Some(0) {
        return Err(ContractError::config_validation(
            "observability.metrics_port",
            "port must be non-zero",
        ));
    }

    if let Some(level) = &section.log_level {
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(ContractError::config_validation(
                "observability.log_level",
                format!("unknown log level '{level}', expected one of {LOG_LEVELS:?}"),
            ));
        }
    }

    Ok(())
}
