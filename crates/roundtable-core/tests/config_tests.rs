//! Configuration management tests
//!
//! Tests for ConfigManager and Config structures.

use std::fs;

use roundtable_core::config::{Config, ConfigManager, GeneralConfig, ServerConfig, StreamConfig};
use roundtable_core::Error;
use tempfile::TempDir;

/// Create a temp directory for config tests
fn setup_config_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

mod config_structure_tests {
    use super::*;

    #[test]
    fn test_section_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.base_url, "http://127.0.0.1:8000");
        assert_eq!(server.request_timeout().as_secs(), 30);
        assert_eq!(server.connect_timeout().as_secs(), 10);
        assert!(server.user_agent.starts_with("Roundtable/"));

        let stream = StreamConfig::default();
        assert_eq!(stream.output_capacity, 256);
        assert_eq!(stream.notification_limit, 50);

        let general = GeneralConfig::default();
        assert_eq!(general.log_level, "info");
        assert_eq!(general.default_analysts, 3);
        assert!(general.confirm_deletes);
    }

    #[test]
    fn test_url_keeps_path() {
        let server = ServerConfig {
            base_url: "https://research.example.com/api/".to_string(),
            ..ServerConfig::default()
        };
        let url = server.url().unwrap();
        assert_eq!(url.path(), "/api/");
    }
}

mod config_serialization_tests {
    use super::*;

    #[test]
    fn test_deserialize_full() {
        let toml_content = r#"
[server]
base_url = "https://research.example.com"
request_timeout_secs = 60
connect_timeout_secs = 5
user_agent = "custom"

[stream]
output_capacity = 32
notification_limit = 5

[general]
log_level = "debug"
default_analysts = 5
confirm_deletes = false
"#;

        let config: Result<Config, _> = toml::from_str(toml_content);
        assert!(config.is_ok(), "Deserialization failed: {:?}", config.err());

        let config = config.unwrap();
        assert_eq!(config.server.base_url, "https://research.example.com");
        assert_eq!(config.server.request_timeout_secs, 60);
        assert_eq!(config.stream.notification_limit, 5);
        assert_eq!(config.general.default_analysts, 5);
        assert!(!config.general.confirm_deletes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.base_url, ServerConfig::default().base_url);
        assert_eq!(config.general.default_analysts, 3);
    }
}

mod config_manager_tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = setup_config_dir();
        let config_path = dir.path().join("config.toml");

        let manager = ConfigManager::with_path(config_path.clone());
        assert!(manager.is_ok(), "Failed to create manager: {:?}", manager.err());

        let manager = manager.unwrap();
        assert_eq!(manager.config_path(), config_path.as_path());
        assert_eq!(manager.config().general.default_analysts, 3);
        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_existing_config() {
        let dir = setup_config_dir();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[general]\ndefault_analysts = 2\nconfirm_deletes = false\n",
        )
        .unwrap();

        let manager = ConfigManager::with_path(config_path).unwrap();
        assert_eq!(manager.config().general.default_analysts, 2);
        assert!(!manager.config().general.confirm_deletes);
    }

    #[test]
    fn test_save_config() {
        let dir = setup_config_dir();
        let config_path = dir.path().join("subdir/config.toml");

        let mut manager = ConfigManager::with_path(config_path.clone()).unwrap();
        manager.config_mut().general.default_analysts = 4;

        let result = manager.save();
        assert!(result.is_ok(), "Save failed: {:?}", result.err());
        assert!(config_path.exists(), "Config file should exist");

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("default_analysts = 4"));

        let reloaded = ConfigManager::with_path(config_path).unwrap();
        assert_eq!(reloaded.config().general.default_analysts, 4);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = setup_config_dir();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[server\nbase_url = ").unwrap();

        let result = ConfigManager::with_path(config_path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_analyst_default_rejected() {
        let dir = setup_config_dir();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[general]\ndefault_analysts = 0\n").unwrap();

        assert!(ConfigManager::with_path(config_path).is_err());
    }

    #[test]
    fn test_set_base_url_validates() {
        let dir = setup_config_dir();
        let mut manager = ConfigManager::with_path(dir.path().join("config.toml")).unwrap();
        let original = manager.config().server.base_url.clone();

        assert!(manager.set_base_url("mailto:someone@example.com").is_err());
        assert_eq!(manager.config().server.base_url, original);

        manager.set_base_url("https://research.example.com").unwrap();
        assert_eq!(manager.config().server.base_url, "https://research.example.com");
    }
}
