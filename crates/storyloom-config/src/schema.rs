use serde::{Deserialize, Serialize};
use storyloom_prompts::PromptConfig;

/// Main Storyloom configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `storyloom.jsonc` - JSON with comments
/// 2. `storyloom.json` - Standard JSON
/// 3. `storyloom.yml` / `storyloom.yaml` - YAML format
///
/// Also checks hidden variants (`.storyloom.*`) and `~/.config/storyloom/` for global config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryloomConfig {
    /// Remote queue (AI Horde) settings
    #[serde(default)]
    pub horde: HordeSettings,

    /// Sampling and job limits
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Prompt assembly settings
    #[serde(default)]
    pub prompts: PromptConfig,

    #[serde(default)]
    pub logging: LoggingSettings,
}

// ============================================================================
// Horde Configuration
// ============================================================================

/// Remote queue settings
///
/// # Example
///
/// ```yaml
/// horde:
///   api_key: ${HORDE_API_KEY}
///   models: ["koboldcpp/Mistral-7B-Instruct"]
///   trusted_workers: true
///   poll_interval_ms: 2000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HordeSettings {
    /// API base URL (default: https://aihorde.net/api/v2)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; `0000000000` is the anonymous key
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// `Client-Agent` header (default: storyloom:<version>:)
    #[serde(default)]
    pub client_agent: Option<String>,

    /// Models to request; empty lets auto-selection decide
    #[serde(default)]
    pub models: Vec<String>,

    /// Worker ids to restrict jobs to
    #[serde(default)]
    pub workers: Vec<String>,

    #[serde(default)]
    pub trusted_workers: bool,

    /// Allow slow workers (default: true)
    #[serde(default = "default_true")]
    pub slow_workers: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pick models from the live catalog when none are pinned (default: true)
    #[serde(default = "default_true")]
    pub auto_select_models: bool,

    /// Case-insensitive name fragments preferred by auto-selection
    /// (default: built-in list of story-capable model families)
    #[serde(default)]
    pub preferred_models: Option<Vec<String>>,

    /// Case-insensitive name fragments never auto-selected
    #[serde(default)]
    pub excluded_models: Option<Vec<String>>,

    #[serde(default = "default_fallback_model_count")]
    pub fallback_model_count: usize,

    /// Context length assumed when no worker reports one (default: 2048)
    #[serde(default = "default_context_length")]
    pub default_context_length: u32,
}

impl Default for HordeSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            client_agent: None,
            models: Vec::new(),
            workers: Vec::new(),
            trusted_workers: false,
            slow_workers: true,
            poll_interval_ms: default_poll_interval_ms(),
            auto_select_models: true,
            preferred_models: None,
            excluded_models: None,
            fallback_model_count: default_fallback_model_count(),
            default_context_length: default_context_length(),
        }
    }
}

fn default_base_url() -> String {
    "https://aihorde.net/api/v2".to_string()
}

fn default_api_key() -> String {
    "0000000000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_fallback_model_count() -> usize {
    3
}

fn default_context_length() -> u32 {
    2048
}

// ============================================================================
// Generation Configuration
// ============================================================================

/// Sampling settings and job limits
///
/// # Example
///
/// ```yaml
/// generation:
///   max_tokens: 300
///   temperature: 0.8
///   timeout_secs: 120
///   stop_sequences: ["\nSam:"]
///   rep_pen: 1.08
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Tokens to generate (default: 512)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Fixed context length; unset sizes it from the worker catalog
    #[serde(default)]
    pub max_context_tokens: Option<u32>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Give up on a job after this long (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Used when a story does not say whether to include dialogue examples
    #[serde(default)]
    pub include_dialogue_examples: bool,

    #[serde(default)]
    pub stop_sequences: Vec<String>,

    #[serde(default)]
    pub top_p: Option<f32>,

    #[serde(default)]
    pub top_k: Option<u32>,

    #[serde(default)]
    pub top_a: Option<f32>,

    #[serde(default)]
    pub typical: Option<f32>,

    #[serde(default)]
    pub tfs: Option<f32>,

    #[serde(default)]
    pub min_p: Option<f32>,

    #[serde(default = "default_rep_pen")]
    pub rep_pen: f32,

    #[serde(default = "default_rep_pen_range")]
    pub rep_pen_range: u32,

    #[serde(default)]
    pub rep_pen_slope: Option<f32>,

    #[serde(default = "default_sampler_order")]
    pub sampler_order: Vec<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_context_tokens: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            include_dialogue_examples: false,
            stop_sequences: Vec::new(),
            top_p: None,
            top_k: None,
            top_a: None,
            typical: None,
            tfs: None,
            min_p: None,
            rep_pen: default_rep_pen(),
            rep_pen_range: default_rep_pen_range(),
            rep_pen_slope: None,
            sampler_order: default_sampler_order(),
        }
    }
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_rep_pen() -> f32 {
    1.1
}

fn default_rep_pen_range() -> u32 {
    320
}

fn default_sampler_order() -> Vec<u32> {
    vec![6, 0, 1, 3, 4, 2, 5]
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: StoryloomConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StoryloomConfig::default());
        assert_eq!(config.horde.api_key, "0000000000");
        assert!(config.horde.slow_workers);
        assert_eq!(config.generation.max_tokens, 512);
        assert_eq!(config.prompts.max_context_chars, 64000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
horde:
  models: ["a", "b"]
  excluded_models: ["tiny"]
generation:
  temperature: 1.2
prompts:
  detailed_perspective: false
  instruction_templates:
    custom: "Keep going."
"#;
        let config: StoryloomConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.horde.models, vec!["a", "b"]);
        assert_eq!(config.horde.excluded_models, Some(vec!["tiny".to_string()]));
        assert!(config.horde.preferred_models.is_none());
        assert_eq!(config.horde.poll_interval_ms, 2000);
        assert_eq!(config.generation.temperature, 1.2);
        assert_eq!(config.generation.rep_pen_range, 320);
        assert!(!config.prompts.detailed_perspective);
        assert_eq!(config.prompts.instruction_templates.custom, "Keep going.");
        assert!(config
            .prompts
            .instruction_templates
            .character
            .contains("{{charName}}"));
    }
}
