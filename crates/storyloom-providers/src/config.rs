//! Back-end and per-call generation configuration

use crate::cancel::CancelSignal;
use crate::error::ProviderError;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://aihorde.net/api/v2";
pub const ANONYMOUS_API_KEY: &str = "0000000000";
pub const DEFAULT_CLIENT_AGENT: &str = concat!("storyloom:", env!("CARGO_PKG_VERSION"), ":");
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_CONTEXT_LENGTH: u32 = 2048;
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_SAMPLER_ORDER: [u32; 7] = [6, 0, 1, 3, 4, 2, 5];

/// Model families preferred by auto-selection
pub const DEFAULT_PREFERRED_MODELS: &[&str] = &[
    "llama-3",
    "llama3",
    "mistral",
    "mixtral",
    "qwen2.5",
    "deepseek",
    "gemma",
    "magnum",
    "mythomax",
    "noromaid",
    "hermes",
    "wizard",
    "airoboros",
    "chronos",
    "stheno",
    "euryale",
    "fimbulvetr",
];

/// Model names never auto-selected
pub const DEFAULT_EXCLUDED_MODELS: &[&str] = &["tinyllama", "debug", "-1b", "-270m", "test"];

/// Pattern lists driving model auto-selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelector {
    pub preferred: Vec<String>,
    pub excluded: Vec<String>,
    /// How many of the busiest models to use when no preferred one is live
    pub fallback_count: usize,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self {
            preferred: DEFAULT_PREFERRED_MODELS.iter().map(|s| s.to_string()).collect(),
            excluded: DEFAULT_EXCLUDED_MODELS.iter().map(|s| s.to_string()).collect(),
            fallback_count: 3,
        }
    }
}

/// Queue back-end configuration
#[derive(Debug, Clone)]
pub struct HordeConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub client_agent: String,
    /// Pinned models; empty means auto-select (when enabled)
    pub models: Vec<String>,
    /// Pinned worker ids
    pub workers: Vec<String>,
    pub trusted_workers: bool,
    pub slow_workers: bool,
    pub poll_interval: Duration,
    pub auto_select_models: bool,
    pub model_selector: ModelSelector,
    /// Context length assumed when no relevant worker reports one
    pub default_context_length: u32,
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::from(ANONYMOUS_API_KEY.to_string()),
            client_agent: DEFAULT_CLIENT_AGENT.to_string(),
            models: Vec::new(),
            workers: Vec::new(),
            trusted_workers: false,
            slow_workers: true,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            auto_select_models: true,
            model_selector: ModelSelector::default(),
            default_context_length: DEFAULT_CONTEXT_LENGTH,
        }
    }
}

impl HordeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_workers(mut self, workers: Vec<String>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_auto_select(mut self, enabled: bool) -> Self {
        self.auto_select_models = enabled;
        self
    }

    pub fn with_model_selector(mut self, selector: ModelSelector) -> Self {
        self.model_selector = selector;
        self
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "API key is required (use \"{}\" for anonymous)",
                ANONYMOUS_API_KEY
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "base URL must not be empty".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ProviderError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-call generation settings
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    /// Fixed context length; `None` lets the worker catalog decide
    pub max_context_length: Option<u32>,
    /// Models for this call only, overriding the configured ones
    pub models: Vec<String>,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub top_a: Option<f32>,
    pub typical: Option<f32>,
    pub tfs: Option<f32>,
    pub min_p: Option<f32>,
    pub rep_pen: f32,
    pub rep_pen_range: u32,
    pub rep_pen_slope: Option<f32>,
    pub sampler_order: Vec<u32>,
    pub stop_sequences: Vec<String>,
    pub timeout: Duration,
    pub cancel: Option<CancelSignal>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            max_context_length: None,
            models: Vec::new(),
            temperature: 0.7,
            top_p: None,
            top_k: None,
            top_a: None,
            typical: None,
            tfs: None,
            min_p: None,
            rep_pen: 1.1,
            rep_pen_range: 320,
            rep_pen_slope: None,
            sampler_order: DEFAULT_SAMPLER_ORDER.to_vec(),
            stop_sequences: Vec::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            cancel: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_context_length(mut self, context_length: u32) -> Self {
        self.max_context_length = Some(context_length);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HordeConfig::default();
        assert_eq!(config.api_base(), "https://aihorde.net/api/v2");
        assert_eq!(config.poll_interval, Duration::from_millis(2000));
        assert!(config.slow_workers);
        assert_eq!(config.model_selector.fallback_count, 3);

        let options = GenerationOptions::default();
        assert_eq!(options.max_tokens, 150);
        assert_eq!(options.timeout, Duration::from_secs(300));
        assert_eq!(options.sampler_order, vec![6, 0, 1, 3, 4, 2, 5]);
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let err = HordeConfig::new("  ").validate().unwrap_err();
        assert!(err.to_string().contains("0000000000"));
        assert!(HordeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_api_base_trims_slash() {
        let config = HordeConfig::default().with_base_url("http://localhost:8080/api/v2/");
        assert_eq!(config.api_base(), "http://localhost:8080/api/v2");
    }
}
