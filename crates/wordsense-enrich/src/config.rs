use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use wordsense_pipeline::{ConfigError, PipelineConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Retries per producer call after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub initial_delay_ms: u64,
    pub pipeline: PipelineConfig,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl EnrichConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(Self {
            pipeline: config.pipeline.checked()?,
            ..config
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|k| std::env::var(k).ok())
    }

    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(n) = lookup("WORDSENSE_MAX_RETRIES") {
            self.max_retries = n.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("WORDSENSE_MAX_RETRIES: `{n}` is not a count"))
            })?;
        }
        if let Some(ms) = lookup("WORDSENSE_INITIAL_DELAY_MS") {
            self.initial_delay_ms = ms.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "WORDSENSE_INITIAL_DELAY_MS: `{ms}` is not a number of milliseconds"
                ))
            })?;
        }
        self.pipeline = self.pipeline.with_env_overrides(&lookup)?;
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.initial_delay_ms))
    }
}
