use super::types::SystemConfig;
use crate::keys::MAX_KEY_ID;
use crate::types::{Error, Result};

/// One day
const MAX_RELOAD_INTERVAL: u64 = 86_400;

/// Validate that a value lies in `min..=max`
pub(crate) fn validate_range(value: u32, field: &str, min: u32, max: u32) -> Result<()> {
    if value < min {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!("Value {} is below minimum allowed value {}", value, min),
        });
    }
    if value > max {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!("Value {} exceeds maximum allowed value {}", value, max),
        });
    }
    Ok(())
}

/// Validate that `path` names an existing regular file
async fn validate_file_accessible(path: &std::path::Path, field: &str) -> Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::Validation {
            field: field.to_string(),
            message: format!("Cannot access '{}': {}", path.display(), e),
        })?;

    if !metadata.is_file() {
        return Err(Error::Validation {
            field: field.to_string(),
            message: format!("'{}' is not a regular file", path.display()),
        });
    }
    Ok(())
}

impl SystemConfig {
    /// Validate the configuration
    pub async fn validate(&self) -> Result<()> {
        validate_file_accessible(&self.keys.file, "keys.file").await?;
        if self.keys.reload_interval > MAX_RELOAD_INTERVAL {
            return Err(Error::Validation {
                field: "keys.reload_interval".to_string(),
                message: format!(
                    "Value {} exceeds maximum allowed value {}",
                    self.keys.reload_interval, MAX_RELOAD_INTERVAL
                ),
            });
        }

        validate_range(self.limits.log_limit, "limits.log_limit", 0, 1000)?;
        validate_range(self.limits.abort_limit, "limits.abort_limit", 1, 1000)?;
        if self.limits.abort_limit <= self.limits.log_limit {
            return Err(Error::Validation {
                field: "limits.abort_limit".to_string(),
                message: format!(
                    "abort_limit ({}) must be greater than log_limit ({})",
                    self.limits.abort_limit, self.limits.log_limit
                ),
            });
        }
        validate_range(self.limits.max_key_id, "limits.max_key_id", 1, MAX_KEY_ID)?;

        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(Error::Validation {
                field: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ),
            });
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(Error::Validation {
                field: "logging.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Must be one of: json, pretty",
                    self.logging.format
                ),
            });
        }

        Ok(())
    }
}
