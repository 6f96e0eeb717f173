//! Conversions from the file configuration to runtime settings

use std::time::Duration;
use storyloom_config::{GenerationSettings, HordeSettings, LoggingSettings};
use storyloom_providers::{
    GenerationOptions, HordeConfig, ModelSelector, SecretString, DEFAULT_EXCLUDED_MODELS,
    DEFAULT_PREFERRED_MODELS,
};
use storyloom_telemetry::TelemetryConfig;

fn owned(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

pub fn horde_config(settings: &HordeSettings) -> HordeConfig {
    let defaults = HordeConfig::default();

    HordeConfig {
        base_url: settings.base_url.clone(),
        api_key: SecretString::from(settings.api_key.clone()),
        client_agent: settings
            .client_agent
            .clone()
            .filter(|agent| !agent.trim().is_empty())
            .unwrap_or(defaults.client_agent),
        models: settings.models.clone(),
        workers: settings.workers.clone(),
        trusted_workers: settings.trusted_workers,
        slow_workers: settings.slow_workers,
        poll_interval: Duration::from_millis(settings.poll_interval_ms),
        auto_select_models: settings.auto_select_models,
        model_selector: ModelSelector {
            preferred: settings
                .preferred_models
                .clone()
                .unwrap_or_else(|| owned(DEFAULT_PREFERRED_MODELS)),
            excluded: settings
                .excluded_models
                .clone()
                .unwrap_or_else(|| owned(DEFAULT_EXCLUDED_MODELS)),
            fallback_count: settings.fallback_model_count,
        },
        default_context_length: settings.default_context_length,
    }
}

pub fn generation_options(settings: &GenerationSettings) -> GenerationOptions {
    GenerationOptions {
        max_tokens: settings.max_tokens,
        max_context_length: settings.max_context_tokens,
        models: Vec::new(),
        temperature: settings.temperature,
        top_p: settings.top_p,
        top_k: settings.top_k,
        top_a: settings.top_a,
        typical: settings.typical,
        tfs: settings.tfs,
        min_p: settings.min_p,
        rep_pen: settings.rep_pen,
        rep_pen_range: settings.rep_pen_range,
        rep_pen_slope: settings.rep_pen_slope,
        sampler_order: settings.sampler_order.clone(),
        stop_sequences: settings.stop_sequences.clone(),
        timeout: Duration::from_secs(settings.timeout_secs),
        cancel: None,
    }
}

/// `--json-logs` forces JSON output regardless of the file setting
pub fn telemetry_config(settings: &LoggingSettings, json_logs: bool) -> TelemetryConfig {
    TelemetryConfig::new(settings.level.clone(), settings.json || json_logs)
}
