//! Story state consumed by prompt assembly

use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_NAME: &str = "User";
pub const DEFAULT_CHAR_NAME: &str = "Character";

/// The user's own character
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub writing_style: Option<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_writing_style(mut self, style: impl Into<String>) -> Self {
        self.writing_style = Some(style.into());
        self
    }
}

/// A character taking part in the story
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCard {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    /// Example dialogue showing how the character speaks
    #[serde(default, alias = "mes_example")]
    pub dialogue_examples: Option<String>,
}

impl CharacterCard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    pub fn with_dialogue_examples(mut self, examples: impl Into<String>) -> Self {
        self.dialogue_examples = Some(examples.into());
        self
    }
}

/// World information activated for the current prompt
///
/// Activation order is significant and is preserved by the assembler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LorebookEntry {
    pub content: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl LorebookEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Per-story prompt toggles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSettings {
    /// `None` means include; only an explicit `false` drops the examples
    #[serde(default)]
    pub include_dialogue_examples: Option<bool>,
    /// Annotate lorebook entries with their comments
    #[serde(default)]
    pub show_prompt: bool,
}

impl PromptSettings {
    pub fn dialogue_examples_enabled(&self) -> bool {
        self.include_dialogue_examples != Some(false)
    }
}

/// Everything the assembler needs to build a system prompt
///
/// Read-only input; assembly never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    #[serde(default)]
    pub persona: Option<Persona>,
    #[serde(default)]
    pub character_cards: Vec<CharacterCard>,
    #[serde(default)]
    pub activated_lorebooks: Vec<LorebookEntry>,
    #[serde(default)]
    pub story: Story,
    #[serde(default)]
    pub settings: PromptSettings,
}

impl PromptContext {
    /// The card that `{{char}}` resolves to outside per-card sections:
    /// the only card, or the first of several.
    pub fn active_character(&self) -> Option<&CharacterCard> {
        self.character_cards.first()
    }

    /// Persona name, or the default when no named persona exists
    pub fn user_name(&self) -> &str {
        self.persona
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_USER_NAME)
    }

    /// Active character name, or the default when no named card exists
    pub fn char_name(&self) -> &str {
        self.active_character()
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CHAR_NAME)
    }

    /// A persona only contributes a section when it carries a name
    pub fn named_persona(&self) -> Option<&Persona> {
        self.persona.as_ref().filter(|p| !p.name.is_empty())
    }
}
