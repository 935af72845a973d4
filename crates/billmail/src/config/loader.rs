use std::path::Path;

use crate::config::schema::{Config, ImageTextProvider, TransportKind};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Upper bound on analyzer attempts per call.
const MAX_RETRY_ATTEMPTS: u32 = 10;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let retry = &config.analyzer.retry;
    if retry.max_attempts == 0 || retry.max_attempts > MAX_RETRY_ATTEMPTS {
        return Err(ConfigError::Validation {
            message: format!(
                "analyzer.retry.max_attempts must be between 1 and {}, got {}",
                MAX_RETRY_ATTEMPTS, retry.max_attempts
            ),
        });
    }

    if config.analyzer.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "analyzer.timeout_secs must be positive".to_string(),
        });
    }

    if !config.delivery.from_address.contains('@') {
        return Err(ConfigError::Validation {
            message: format!(
                "delivery.from_address is not an email address: {}",
                config.delivery.from_address
            ),
        });
    }

    if config.delivery.transport == TransportKind::Smtp && config.delivery.smtp.is_none() {
        return Err(ConfigError::Validation {
            message: "delivery.transport is 'smtp' but no delivery.smtp section is given"
                .to_string(),
        });
    }

    if config.image_text.provider == ImageTextProvider::Tesseract && !cfg!(feature = "tesseract") {
        return Err(ConfigError::Validation {
            message: "image_text.provider 'tesseract' requires building with the 'tesseract' feature"
                .to_string(),
        });
    }

    Ok(())
}
