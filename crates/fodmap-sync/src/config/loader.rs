use std::path::Path;

use crate::config::schema::SyncConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<SyncConfig, ConfigError> {
    let config: SyncConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &SyncConfig) -> Result<(), ConfigError> {
    if config.is_configured() {
        let url = reqwest::Url::parse(config.api_endpoint.trim()).map_err(|e| {
            ConfigError::Validation {
                message: format!("Invalid apiEndpoint '{}': {}", config.api_endpoint, e),
            }
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation {
                message: format!("apiEndpoint must be http(s), got '{}'", url.scheme()),
            });
        }
    }

    if config.max_retry_attempts < 1 {
        return Err(ConfigError::Validation {
            message: "maxRetryAttempts must be at least 1".to_string(),
        });
    }
    if config.backoff_multiplier < 1 {
        return Err(ConfigError::Validation {
            message: "backoffMultiplier must be at least 1".to_string(),
        });
    }
    if config.retry_base_delay_ms < 1 {
        return Err(ConfigError::Validation {
            message: "retryBaseDelayMs must be at least 1".to_string(),
        });
    }
    if config.submit_batch_size < 1 || config.poll_batch_size < 1 {
        return Err(ConfigError::Validation {
            message: "batch sizes must be at least 1".to_string(),
        });
    }
    if config.submit_interval_secs < 1 || config.poll_interval_secs < 1 {
        return Err(ConfigError::Validation {
            message: "cycle intervals must be at least 1 second".to_string(),
        });
    }
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation {
            message: "requestTimeoutSecs must be at least 1".to_string(),
        });
    }

    Ok(())
}
