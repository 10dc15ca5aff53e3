//! `travel-planner.toml` loading and validation.
//!
//! Every section is optional. A missing `[llm]` section means the stages draft
//! from the destination catalog only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use llm::{AuthScheme, LlmConfig};
use nodes::{ExecutorConfig, RefineSettings};
use pipeline::StepCeiling;
use serde::Deserialize;
use thiserror::Error;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "travel-planner.toml";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub pipeline: PipelineSection,
    pub llm: Option<LlmSection>,
    pub telemetry: TelemetrySection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub step_ceiling: u32,
    pub event_buffer: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            step_ceiling: StepCeiling::DEFAULT.get(),
            event_buffer: ExecutorConfig::default().event_buffer,
        }
    }
}

/// Chat-completions endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub auth: AuthScheme,
    pub api_version: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_attempts: u32,
    pub timeout_secs: u64,
    /// Longest `Retry-After` the provider waits for before giving up.
    pub max_retry_after_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        let defaults = LlmConfig::default();
        let refine = RefineSettings::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            api_key_env: "OPENAI_API_KEY".to_string(),
            auth: defaults.auth,
            api_version: None,
            temperature: refine.temperature.unwrap_or(0.4),
            max_tokens: refine.max_tokens.unwrap_or(800),
            max_attempts: defaults.max_attempts,
            timeout_secs: defaults.timeout.as_secs(),
            max_retry_after_secs: defaults.max_retry_after.as_secs(),
        }
    }
}

impl LlmSection {
    /// Provider settings, with the key resolved by the caller.
    pub fn to_llm_config(&self, api_key: Option<String>) -> LlmConfig {
        LlmConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key,
            auth: self.auth,
            api_version: self.api_version.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
            max_retry_after: Duration::from_secs(self.max_retry_after_secs),
            ..LlmConfig::default()
        }
    }

    pub fn refine_settings(&self) -> RefineSettings {
        RefineSettings {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    pub log_format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// OTLP gRPC collector; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl CliConfig {
    /// Loads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Loads `explicit` if given; otherwise [`DEFAULT_CONFIG_FILE`] when it
    /// exists, falling back to defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: CliConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.step_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.step_ceiling must be > 0".to_string(),
            ));
        }
        if self.pipeline.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.event_buffer must be > 0".to_string(),
            ));
        }

        if let Some(llm) = &self.llm {
            if llm.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "llm.base_url must not be empty".to_string(),
                ));
            }
            if llm.model.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "llm.model must not be empty".to_string(),
                ));
            }
            if !(0.0..=2.0).contains(&llm.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "llm.temperature must be within [0, 2], got {}",
                    llm.temperature
                )));
            }
            if llm.max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "llm.max_attempts must be > 0".to_string(),
                ));
            }
            if llm.timeout_secs == 0 {
                return Err(ConfigError::Invalid(
                    "llm.timeout_secs must be > 0".to_string(),
                ));
            }
        }

        if self.telemetry.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "telemetry.log_level must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Executor settings, with an optional command-line ceiling taking
    /// precedence over the file.
    pub fn executor_config(
        &self,
        ceiling_override: Option<u32>,
    ) -> Result<ExecutorConfig, ConfigError> {
        let limit = ceiling_override.unwrap_or(self.pipeline.step_ceiling);
        let step_ceiling = StepCeiling::new(limit)
            .ok_or_else(|| ConfigError::Invalid("step ceiling must be > 0".to_string()))?;
        Ok(ExecutorConfig {
            step_ceiling,
            event_buffer: self.pipeline.event_buffer,
        })
    }
}
