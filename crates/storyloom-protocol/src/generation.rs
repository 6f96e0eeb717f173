//! Generation requests, results and job events

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which built-in instruction drives the generation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    /// Continue the story from where it left off
    #[default]
    Continue,
    /// Write the next part from one character's perspective
    Character,
    /// Follow the caller's own instruction
    Custom,
    /// Anything unrecognised; resolves to the default custom instruction
    #[serde(other)]
    Other,
}

impl GenerationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Character => "character",
            Self::Custom => "custom",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for GenerationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Self::Continue,
            "character" => Self::Character,
            "custom" => Self::Custom,
            _ => Self::Other,
        })
    }
}

/// Input to the generation prompt builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequestParams {
    #[serde(rename = "type", default)]
    pub generation_type: GenerationType,
    #[serde(default)]
    pub story_content: Option<String>,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub custom_instruction: Option<String>,
    /// Replaces the built-in instruction when non-empty
    #[serde(default)]
    pub template_text: Option<String>,
    /// Trailing story characters to keep; falls back to the assembler default
    #[serde(default)]
    pub max_chars: Option<usize>,
}

impl GenerationRequestParams {
    pub fn new(generation_type: GenerationType) -> Self {
        Self {
            generation_type,
            ..Default::default()
        }
    }

    pub fn with_story(mut self, content: impl Into<String>) -> Self {
        self.story_content = Some(content.into());
        self
    }

    pub fn with_character(mut self, name: impl Into<String>) -> Self {
        self.character_name = Some(name.into());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.custom_instruction = Some(instruction.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template_text = Some(template.into());
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

/// Final output of a generation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub reasoning: Option<String>,
    pub usage: Usage,
    pub metadata: GenerationMetadata,
}

/// Events emitted by the streaming generation variants
///
/// A sequence always ends with exactly one `Complete`, or with an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// Queue progress reported by one poll
    Status {
        queue_position: u64,
        wait_time: u64,
        finished: bool,
        faulted: bool,
    },
    /// Incremental text from a token-streaming back-end
    Delta { text: String },
    Complete {
        content: String,
        #[serde(default)]
        usage: Usage,
        metadata: GenerationMetadata,
    },
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_type_from_str() {
        assert_eq!("continue".parse::<GenerationType>().unwrap(), GenerationType::Continue);
        assert_eq!("Character".parse::<GenerationType>().unwrap(), GenerationType::Character);
        assert_eq!("custom".parse::<GenerationType>().unwrap(), GenerationType::Custom);
        assert_eq!("rewrite".parse::<GenerationType>().unwrap(), GenerationType::Other);
    }

    #[test]
    fn test_unknown_type_deserializes_to_other() {
        let params: GenerationRequestParams =
            serde_json::from_str(r#"{"type": "summarize"}"#).unwrap();
        assert_eq!(params.generation_type, GenerationType::Other);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = GenerationEvent::Status {
            queue_position: 3,
            wait_time: 12,
            finished: false,
            faulted: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["queue_position"], 3);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_complete_event_carries_usage() {
        let event = GenerationEvent::Complete {
            content: "Done.".to_string(),
            usage: Usage { total_tokens: 12 },
            metadata: GenerationMetadata::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["usage"]["total_tokens"], 12);
        assert!(event.is_terminal());

        let parsed: GenerationEvent =
            serde_json::from_str(r#"{"type": "complete", "content": "x", "metadata": {}}"#).unwrap();
        assert!(matches!(parsed, GenerationEvent::Complete { usage, .. } if usage.total_tokens == 0));
    }
}
