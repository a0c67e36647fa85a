//! Pipeline configuration.
//!
//! Deserialized as the `pipeline` section of a JSON config file, then
//! overridden from `WORDSENSE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Placeholder image used when a producer supplies no usable image.
pub const DEFAULT_PLACEHOLDER_URL: &str = "https://placehold.co/512x512?text=image+pending";

/// The producer is asked for zero, one or two mnemonic chains per sense.
pub const DEFAULT_MAX_LINK_CHAINS: usize = 2;

/// What to do with fields a strict shape does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    #[default]
    Reject,
    Ignore,
}

impl std::str::FromStr for UnknownFieldPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(UnknownFieldPolicy::Reject),
            "ignore" => Ok(UnknownFieldPolicy::Ignore),
            other => Err(ConfigError::Invalid(format!(
                "unknown field policy `{other}` (expected reject|ignore)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub placeholder_url: String,
    pub unknown_fields: UnknownFieldPolicy,
    /// `None` disables the limit.
    pub max_link_chains_per_sense: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            placeholder_url: DEFAULT_PLACEHOLDER_URL.to_string(),
            unknown_fields: UnknownFieldPolicy::Reject,
            max_link_chains_per_sense: Some(DEFAULT_MAX_LINK_CHAINS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl PipelineConfig {
    /// Apply `WORDSENSE_*` overrides read through `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup("WORDSENSE_PLACEHOLDER_URL") {
            self.placeholder_url = url;
        }
        if let Some(policy) = lookup("WORDSENSE_UNKNOWN_FIELDS") {
            self.unknown_fields = policy.parse()?;
        }
        if let Some(max) = lookup("WORDSENSE_MAX_LINK_CHAINS") {
            self.max_link_chains_per_sense = match max.trim() {
                "" | "none" | "unlimited" => None,
                n => Some(n.parse().map_err(|_| {
                    ConfigError::Invalid(format!("WORDSENSE_MAX_LINK_CHAINS: `{n}` is not a count"))
                })?),
            };
        }
        self.checked()
    }

    /// Reject values that would only fail later, mid-build.
    pub fn checked(self) -> Result<Self, ConfigError> {
        url::Url::parse(&self.placeholder_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "placeholder_url `{}` is not a URL: {e}",
                self.placeholder_url
            ))
        })?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_producer_contract() {
        let config = PipelineConfig::default();
        assert_eq!(config.placeholder_url, DEFAULT_PLACEHOLDER_URL);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Reject);
        assert_eq!(config.max_link_chains_per_sense, Some(2));
    }

    #[test]
    fn env_overrides_apply() {
        let config = PipelineConfig::default()
            .with_env_overrides(env(&[
                ("WORDSENSE_PLACEHOLDER_URL", "https://img.example/blank.png"),
                ("WORDSENSE_UNKNOWN_FIELDS", "Ignore"),
                ("WORDSENSE_MAX_LINK_CHAINS", "none"),
            ]))
            .unwrap();
        assert_eq!(config.placeholder_url, "https://img.example/blank.png");
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Ignore);
        assert_eq!(config.max_link_chains_per_sense, None);
    }

    #[test]
    fn bad_overrides_are_rejected() {
        let err = PipelineConfig::default()
            .with_env_overrides(env(&[("WORDSENSE_MAX_LINK_CHAINS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = PipelineConfig::default()
            .with_env_overrides(env(&[("WORDSENSE_PLACEHOLDER_URL", "not a url")]))
            .unwrap_err();
        assert!(err.to_string().contains("placeholder_url"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"unknown_fields":"ignore"}"#).unwrap();
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Ignore);
        assert_eq!(config.placeholder_url, DEFAULT_PLACEHOLDER_URL);
    }
}
