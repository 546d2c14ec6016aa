//! Logging setup
//!
//! Structured logging through `tracing`, written as JSON or in a
//! human-readable format. Each key file load runs inside a `key_load` span
//! so every event it emits carries the file name.

use tracing::{info_span, Span};
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

use crate::config::SystemConfig;
use crate::types::{Error, Result};

/// Span wrapping one load of `key_file`
pub fn load_span(key_file: &str) -> Span {
    info_span!("key_load", key_file = key_file)
}

/// Span wrapping a reload triggered by `trigger` (signal or poll)
pub fn reload_span(trigger: &str) -> Span {
    info_span!("key_reload", trigger = trigger)
}

/// Log level enum values as strings for configuration
pub mod level {
    pub const TRACE: &str = "trace";
    pub const DEBUG: &str = "debug";
    pub const INFO: &str = "info";
    pub const WARN: &str = "warn";
    pub const ERROR: &str = "error";
}

/// Log format enum values as strings for configuration
pub mod format {
    pub const JSON: &str = "json";
    pub const PRETTY: &str = "pretty";
}

/// Initialize the global subscriber
///
/// Precedence for level and format: CLI arguments, then the system
/// configuration, then the defaults (`info`, `pretty`). `RUST_LOG` overrides
/// the level entirely when set.
pub fn init(
    log_level_override: Option<&str>,
    log_format_override: Option<&str>,
    system_config: Option<&SystemConfig>,
) -> Result<()> {
    let log_level = if let Some(level) = log_level_override {
        level
    } else if let Some(config) = system_config {
        &config.logging.level
    } else {
        level::INFO
    };

    let log_format = if let Some(fmt) = log_format_override {
        fmt
    } else if let Some(config) = system_config {
        &config.logging.format
    } else {
        format::PRETTY
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    let installed = match log_format {
        format::JSON => tracing_subscriber::fmt()
            .json()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        format::PRETTY => tracing_subscriber::fmt()
            .pretty()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .try_init(),
    };

    installed.map_err(|e| Error::Application(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_span_creation() {
        let span = load_span("/etc/ntp.keys");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "key_load");
        }
        let _guard = span.enter();
    }

    #[test]
    fn test_reload_span_creation() {
        let span = reload_span("sighup");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "key_reload");
        }
        let _guard = span.enter();
    }

    #[test]
    fn test_format_constants() {
        assert_eq!(format::JSON, "json");
        assert_eq!(format::PRETTY, "pretty");
        assert_eq!(level::INFO, "info");
    }
}
