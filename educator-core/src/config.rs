//! Backend configuration loaded from the environment.

use std::time::Duration;

use crate::domain::{DEFAULT_TIMEOUT_SECS, GenerationRequest, GenerationRequestBuilder};
use crate::error::{EducatorError, Result};
use crate::retry::RetryPolicy;

/// Base URL used when `OLLAMA_API_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// Model used when callers do not name one.
pub const DEFAULT_MODEL: &str = "codellama";

/// Settings shared by every service that talks to the model backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend base URL without a trailing slash.
    pub base_url: String,
    /// Model used when a call does not specify one.
    pub default_model: String,
    /// Maximum attempts for a buffered generation call.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each failure.
    pub retry_delay: Duration,
    /// Per-call timeout for generation, and stream inactivity limit.
    pub request_timeout: Duration,
    /// Timeout for connectivity probes.
    pub probe_timeout: Duration,
    /// Language the model should answer in, if any.
    pub reply_language: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(5),
            reply_language: None,
        }
    }
}

impl BackendConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let config = Self {
            base_url: read("OLLAMA_API_URL").unwrap_or(defaults.base_url),
            default_model: read("EDUCATOR_MODEL").unwrap_or(defaults.default_model),
            max_retries: match read("EDUCATOR_MAX_RETRIES") {
                Some(raw) => parse_number("EDUCATOR_MAX_RETRIES", &raw)?,
                None => defaults.max_retries,
            },
            retry_delay: read_secs(&read, "EDUCATOR_RETRY_DELAY_SECS")?
                .unwrap_or(defaults.retry_delay),
            request_timeout: read_secs(&read, "EDUCATOR_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout),
            probe_timeout: read_secs(&read, "EDUCATOR_PROBE_TIMEOUT_SECS")?
                .unwrap_or(defaults.probe_timeout),
            reply_language: read("EDUCATOR_REPLY_LANGUAGE"),
        };
        config.validate()
    }

    /// Normalize and check the configuration.
    pub fn validate(mut self) -> Result<Self> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(EducatorError::InvalidInput(
                "backend url is required".to_string(),
            ));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(EducatorError::InvalidInput(format!(
                "backend url must start with http:// or https://: {trimmed}"
            )));
        }
        self.base_url = trimmed.to_string();
        self.default_model = self.default_model.trim().to_string();
        if self.default_model.is_empty() {
            return Err(EducatorError::InvalidInput(
                "default model must not be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(EducatorError::InvalidInput(
                "max retries must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.probe_timeout.is_zero() {
            return Err(EducatorError::InvalidInput(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(self)
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }

    /// Start a generation request using the configured defaults.
    pub fn request(
        &self,
        prompt: impl Into<String>,
        model: Option<&str>,
    ) -> GenerationRequestBuilder {
        let model = model
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(&self.default_model);
        GenerationRequest::builder(prompt, model).timeout_seconds(self.request_timeout.as_secs())
    }
}

fn read_secs<F>(read: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    read(key)
        .map(|raw| parse_number::<u64>(key, &raw).map(Duration::from_secs))
        .transpose()
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| EducatorError::InvalidInput(format!("{key} must be a number, got {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = BackendConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, BackendConfig::default());
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.default_model, "codellama");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn reads_overrides_and_trims_url() {
        let config = BackendConfig::from_lookup(lookup(&[
            ("OLLAMA_API_URL", "http://ollama:11434/"),
            ("EDUCATOR_MODEL", "llama3"),
            ("EDUCATOR_MAX_RETRIES", "5"),
            ("EDUCATOR_RETRY_DELAY_SECS", "2"),
            ("EDUCATOR_TIMEOUT_SECS", "60"),
            ("EDUCATOR_REPLY_LANGUAGE", "Korean"),
        ]))
        .expect("config");

        assert_eq!(config.base_url, "http://ollama:11434");
        assert_eq!(config.default_model, "llama3");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.reply_language.as_deref(), Some("Korean"));
    }

    #[test]
    fn rejects_unparsable_and_invalid_values() {
        let err = BackendConfig::from_lookup(lookup(&[("EDUCATOR_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("EDUCATOR_MAX_RETRIES"));

        let err =
            BackendConfig::from_lookup(lookup(&[("EDUCATOR_MAX_RETRIES", "0")])).unwrap_err();
        assert!(matches!(err, EducatorError::InvalidInput(_)));

        let err = BackendConfig::from_lookup(lookup(&[("OLLAMA_API_URL", "localhost:11434")]))
            .unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn request_threads_default_model_and_timeout() {
        let config = BackendConfig {
            request_timeout: Duration::from_secs(12),
            ..BackendConfig::default()
        };
        let request = config.request("hello", None).build().expect("request");
        assert_eq!(request.model(), "codellama");
        assert_eq!(request.timeout_seconds(), 12);

        let request = config
            .request("hello", Some("mistral"))
            .build()
            .expect("request");
        assert_eq!(request.model(), "mistral");
    }
}
