pub mod types;
mod validators;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validators::validate_range;
    use crate::keys::LoaderLimits;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn config_for(key_file: &NamedTempFile) -> SystemConfig {
        let mut config = SystemConfig::default();
        config.keys.file = key_file.path().to_path_buf();
        config
    }

    #[test]
    fn test_system_config_complete() {
        let config_toml = r#"
[keys]
file = "/var/lib/ntp/ntp.keys"
reload_interval = 30

[limits]
log_limit = 3
abort_limit = 10
max_key_id = 1000

[logging]
level = "debug"
format = "json"

[monitoring]
metrics_enabled = false
"#;
        let config: SystemConfig = toml::from_str(config_toml).unwrap();

        assert_eq!(config.keys.file, PathBuf::from("/var/lib/ntp/ntp.keys"));
        assert_eq!(config.keys.reload_period(), Some(Duration::from_secs(30)));
        assert_eq!(config.limits.log_limit, 3);
        assert_eq!(config.limits.abort_limit, 10);
        assert_eq!(config.limits.max_key_id, 1000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert!(!config.monitoring.metrics_enabled);
    }

    #[test]
    fn test_system_config_minimal() {
        let config: SystemConfig = toml::from_str("").unwrap();

        assert_eq!(config.keys.file, PathBuf::from("/etc/ntp.keys"));
        assert_eq!(config.keys.reload_period(), None);
        assert_eq!(LoaderLimits::from(&config.limits), LoaderLimits::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.monitoring.metrics_enabled);
    }

    #[test]
    fn test_serde_default_application() {
        let config: SystemConfig = toml::from_str("[limits]\nabort_limit = 40\n").unwrap();
        assert_eq!(config.limits.abort_limit, 40);
        assert_eq!(config.limits.log_limit, 5);
        assert_eq!(config.limits.max_key_id, 65535);
    }

    #[test]
    fn test_limits_conversion() {
        let limits = LimitsConfig {
            log_limit: 1,
            abort_limit: 2,
            max_key_id: 100,
        };
        let loader_limits = LoaderLimits::from(&limits);
        assert_eq!(loader_limits.log_limit, 1);
        assert_eq!(loader_limits.abort_limit, 2);
        assert_eq!(loader_limits.max_key_id, 100);
    }

    #[test]
    fn test_load_valid_system_config() {
        let file = create_temp_file("[keys]\nfile = \"/tmp/test.keys\"\n");
        let config = SystemConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.keys.file, PathBuf::from("/tmp/test.keys"));
    }

    #[test]
    fn test_load_missing_file() {
        match SystemConfig::load_from_file("/nonexistent/authkeys.toml") {
            Err(crate::types::Error::Config(crate::types::ConfigError::FileNotFound { path })) => {
                assert!(path.contains("authkeys.toml"));
            }
            _ => panic!("Expected FileNotFound error"),
        }
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_file("[keys\nfile = ");
        match SystemConfig::load_from_file(file.path()) {
            Err(crate::types::Error::Config(crate::types::ConfigError::ParseError(_))) => {}
            _ => panic!("Expected ParseError for invalid TOML"),
        }
    }

    #[test]
    fn test_load_invalid_structure() {
        let file = create_temp_file("[limits]\nlog_limit = \"many\"\n");
        match SystemConfig::load_from_file(file.path()) {
            Err(crate::types::Error::Config(crate::types::ConfigError::ParseError(_))) => {}
            _ => panic!("Expected ParseError for type mismatch"),
        }
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(5, "field", 1, 10).is_ok());
        assert!(validate_range(0, "field", 1, 10).is_err());
        assert!(validate_range(11, "field", 1, 10).is_err());
    }

    #[tokio::test]
    async fn test_system_config_validation_success() {
        let key_file = create_temp_file("1 MD5 secret\n");
        assert!(config_for(&key_file).validate().await.is_ok());
    }

    #[tokio::test]
    async fn test_system_config_validation_missing_key_file() {
        let mut config = SystemConfig::default();
        config.keys.file = PathBuf::from("/nonexistent/ntp.keys");

        match config.validate().await {
            Err(crate::types::Error::Validation { field, .. }) => assert_eq!(field, "keys.file"),
            _ => panic!("Expected validation error for missing key file"),
        }
    }

    #[tokio::test]
    async fn test_system_config_validation_key_file_is_directory() {
        let mut config = SystemConfig::default();
        config.keys.file = std::env::temp_dir();

        match config.validate().await {
            Err(crate::types::Error::Validation { field, message }) => {
                assert_eq!(field, "keys.file");
                assert!(message.contains("not a regular file"));
            }
            _ => panic!("Expected validation error for directory"),
        }
    }

    #[tokio::test]
    async fn test_system_config_validation_abort_not_above_log() {
        let key_file = create_temp_file("");
        let mut config = config_for(&key_file);
        config.limits.log_limit = 10;
        config.limits.abort_limit = 10;

        match config.validate().await {
            Err(crate::types::Error::Validation { field, message }) => {
                assert_eq!(field, "limits.abort_limit");
                assert!(message.contains("greater than log_limit"));
            }
            _ => panic!("Expected validation error for abort_limit"),
        }
    }

    #[tokio::test]
    async fn test_system_config_validation_max_key_id() {
        let key_file = create_temp_file("");
        let mut config = config_for(&key_file);
        config.limits.max_key_id = 70000;

        match config.validate().await {
            Err(crate::types::Error::Validation { field, message }) => {
                assert_eq!(field, "limits.max_key_id");
                assert!(message.contains("exceeds maximum"));
            }
            _ => panic!("Expected validation error for max_key_id"),
        }
    }

    #[tokio::test]
    async fn test_system_config_validation_reload_interval() {
        let key_file = create_temp_file("");
        let mut config = config_for(&key_file);
        config.keys.reload_interval = 100_000;

        match config.validate().await {
            Err(crate::types::Error::Validation { field, .. }) => {
                assert_eq!(field, "keys.reload_interval")
            }
            _ => panic!("Expected validation error for reload_interval"),
        }
    }

    #[tokio::test]
    async fn test_system_config_validation_invalid_log_level() {
        let key_file = create_temp_file("");
        let mut config = config_for(&key_file);
        config.logging.level = "verbose".to_string();

        match config.validate().await {
            Err(crate::types::Error::Validation { field, message }) => {
                assert_eq!(field, "logging.level");
                assert!(message.contains("Invalid log level"));
            }
            _ => panic!("Expected validation error for invalid log level"),
        }
    }

    #[tokio::test]
    async fn test_system_config_validation_invalid_log_format() {
        let key_file = create_temp_file("");
        let mut config = config_for(&key_file);
        config.logging.format = "xml".to_string();

        match config.validate().await {
            Err(crate::types::Error::Validation { field, message }) => {
                assert_eq!(field, "logging.format");
                assert!(message.contains("Invalid log format"));
            }
            _ => panic!("Expected validation error for invalid log format"),
        }
    }
}
