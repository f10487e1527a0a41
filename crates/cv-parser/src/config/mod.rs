//! Environment-driven configuration loading.

pub mod schema;
pub mod startup;

pub use schema::{
    AmqpConfig, AppConfig, FileConfig, LlmConfig, PoolConfig, PoolsConfig, Profile,
    StorageConfig,
};
pub use startup::{StartupGuard, StartupWarning};

use std::env;

use crate::error::ConfigError;

/// Builds an [`AppConfig`] from process environment variables, falling back
/// to per-field defaults. Absent variables are fine; present-but-unparsable
/// ones are configuration errors.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();

    if let Ok(value) = env::var("APP_PROFILE") {
        config.profile = Profile::from_env_value(&value);
    }

    if let Ok(value) = env::var("AMQP_URI") {
        config.amqp.uri = value;
    }
    if let Some(value) = parse_var("AMQP_PREFETCH")? {
        config.amqp.prefetch = value;
    }
    if let Some(value) = parse_var("AMQP_MAX_ATTEMPTS")? {
        config.amqp.max_attempts = value;
    }

    if let Ok(value) = env::var("STORAGE_ENDPOINT") {
        config.storage.endpoint = value;
    }
    if let Ok(value) = env::var("STORAGE_ACCESS_KEY_ID") {
        config.storage.access_key_id = value;
    }
    if let Ok(value) = env::var("STORAGE_SECRET_ACCESS_KEY") {
        config.storage.secret_access_key = value;
    }
    if let Ok(value) = env::var("STORAGE_REGION") {
        config.storage.region = value;
    }

    config.llm.api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
    if let Ok(value) = env::var("GEMINI_BASE_URL") {
        config.llm.base_url = value;
    }
    if let Ok(value) = env::var("GEMINI_MODEL") {
        config.llm.model = value;
    }
    if let Some(value) = parse_var("GEMINI_TIMEOUT_SECONDS")? {
        config.llm.timeout_seconds = value;
    }

    if let Some(value) = parse_var("FILE_MAX_SIZE_MB")? {
        config.file.max_size_mb = value;
    }
    if let Some(value) = parse_var("FILE_MAX_PAGES")? {
        config.file.max_pages = value;
    }

    if let Some(value) = parse_var("POOL_PARSING_WORKERS")? {
        config.pools.parsing.workers = value;
    }
    if let Some(value) = parse_var("POOL_OCR_WORKERS")? {
        config.pools.ocr.workers = value;
    }
    if let Some(value) = parse_var("POOL_LLM_WORKERS")? {
        config.pools.llm.workers = value;
    }

    if let Ok(value) = env::var("OCR_ENABLED") {
        config.ocr_enabled = matches!(value.to_ascii_lowercase().as_str(), "true" | "1");
    }

    Ok(config)
}

fn parse_var<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key,
                reason: format!("cannot parse '{}'", raw),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "APP_PROFILE",
            "AMQP_URI",
            "AMQP_PREFETCH",
            "AMQP_MAX_ATTEMPTS",
            "STORAGE_ENDPOINT",
            "GEMINI_API_KEY",
            "FILE_MAX_SIZE_MB",
            "POOL_PARSING_WORKERS",
            "OCR_ENABLED",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_env_is_empty() {
        clear_env();
        let config = load_from_env().unwrap();
        assert_eq!(config.profile, Profile::Development);
        assert_eq!(config.amqp.max_attempts, 3);
        assert_eq!(config.file.max_size_mb, 10);
        assert!(config.llm.api_key.is_none());
        assert!(!config.ocr_enabled);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("APP_PROFILE", "production");
        std::env::set_var("AMQP_PREFETCH", "16");
        std::env::set_var("GEMINI_API_KEY", "test-key");
        std::env::set_var("OCR_ENABLED", "true");
        let config = load_from_env().unwrap();
        assert_eq!(config.profile, Profile::Production);
        assert_eq!(config.amqp.prefetch, 16);
        assert_eq!(config.llm.api_key.as_deref(), Some("test-key"));
        assert!(config.ocr_enabled);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_value_is_an_error() {
        clear_env();
        std::env::set_var("FILE_MAX_SIZE_MB", "ten");
        let result = load_from_env();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_api_key_counts_as_absent() {
        clear_env();
        std::env::set_var("GEMINI_API_KEY", "");
        let config = load_from_env().unwrap();
        assert!(config.llm.api_key.is_none());
        clear_env();
    }
}
