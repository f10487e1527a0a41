//! Fail-fast configuration checks at process start.
//!
//! Production refuses to start without storage credentials and an LLM key;
//! development degrades with warnings so local runs against MinIO work out
//! of the box.

use crate::config::{AppConfig, Profile};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupWarning {
    LlmDisabled,
    OcrDisabled,
    StorageCredentialsMissing,
}

impl std::fmt::Display for StartupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupWarning::LlmDisabled => f.write_str(
                "no LLM API key configured, extraction and scoring will fail permanently",
            ),
            StartupWarning::OcrDisabled => {
                f.write_str("OCR is disabled, image-based documents will fail")
            }
            StartupWarning::StorageCredentialsMissing => {
                f.write_str("storage credentials missing, relying on ambient provider chain")
            }
        }
    }
}

pub struct StartupGuard;

impl StartupGuard {
    /// Checks the loaded configuration against the active profile.
    ///
    /// Errors are fatal; warnings are returned for the caller to log.
    pub fn check(config: &AppConfig) -> Result<Vec<StartupWarning>, ConfigError> {
        if config.profile == Profile::Test {
            return Ok(Vec::new());
        }

        let mut warnings = Vec::new();

        if config.amqp.uri.is_empty() {
            return Err(ConfigError::MissingRequired("AMQP_URI".into()));
        }
        if config.storage.endpoint.is_empty() {
            return Err(ConfigError::MissingRequired("STORAGE_ENDPOINT".into()));
        }

        let has_credentials = !config.storage.access_key_id.is_empty()
            && !config.storage.secret_access_key.is_empty();

        match config.profile {
            Profile::Production => {
                if !has_credentials {
                    return Err(ConfigError::MissingRequired(
                        "STORAGE_ACCESS_KEY_ID / STORAGE_SECRET_ACCESS_KEY".into(),
                    ));
                }
                if config.llm.api_key.is_none() {
                    return Err(ConfigError::MissingRequired("GEMINI_API_KEY".into()));
                }
            }
            Profile::Development => {
                if !has_credentials {
                    warnings.push(StartupWarning::StorageCredentialsMissing);
                }
                if config.llm.api_key.is_none() {
                    warnings.push(StartupWarning::LlmDisabled);
                }
            }
            Profile::Test => unreachable!(),
        }

        // No OCR engine ships in this binary; refusing the flag beats
        // silently accepting a setting that changes nothing.
        if config.ocr_enabled {
            return Err(ConfigError::Invalid {
                key: "OCR_ENABLED",
                reason: "no OCR engine is available in this build".into(),
            });
        }
        warnings.push(StartupWarning::OcrDisabled);

        Ok(warnings)
    }
}
