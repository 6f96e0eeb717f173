//! Built-in instruction templates

use serde::{Deserialize, Serialize};

/// Instruction text appended after the story block
///
/// `{{charName}}` / `{{char}}` name the focal character, `{{instruction}}`
/// carries the user's own request and `{{storyContent}}` inlines the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstructionTemplates {
    #[serde(rename = "continue")]
    pub continue_story: String,
    pub character: String,
    pub custom: String,
    /// Continue with extra direction from the user
    pub instruction: String,
    pub rewrite_third_person: String,
}

impl Default for InstructionTemplates {
    fn default() -> Self {
        Self {
            continue_story: "Continue the story naturally from where it left off. Write the next 2-3 paragraphs maximum, maintaining the established tone and style, write less if it makes sense stylistically or sets up a good response opportunity for other characters.".to_string(),
            character: "Write the next part of the story from {{charName}}'s perspective. Focus on their thoughts, actions, and dialogue. Write 2-3 paragraphs maximum, less if it makes sense stylistically or sets up a good response opportunity for other characters. (There is a chance that \"{{charName}}'s\" is multiple characters, at which point you may respond as any of them as is relevant to the story.)".to_string(),
            custom: "Continue the story.".to_string(),
            instruction: "Continue the story naturally from where it left off. Write the next 2-3 paragraphs maximum, maintaining the established tone and style, write less if it makes sense stylistically or sets up a good response opportunity for other characters. The user additionally sends along these instructions for what they would like to see happen: {{instruction}}".to_string(),
            rewrite_third_person: "Rewrite the following text to be in third person narrative perspective, using past tense. Assume reference to \"you\" in the original text are meant to reference the user's Persona, if one is provided. Convert all first-person and second-person pronouns (I, me, my, we, us, our, you) to third-person (he, she, they, him, her, them, his, her, their). Change all verbs to past tense. Maintain the same events, dialogue, and meaning, but from a third-person narrator's viewpoint. Only return the rewritten text by itself in your response.\n\nText to rewrite:\n\n{{storyContent}}".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_placeholders() {
        let templates = InstructionTemplates::default();
        assert!(templates.character.contains("{{charName}}"));
        assert!(templates.instruction.contains("{{instruction}}"));
        assert!(templates.rewrite_third_person.contains("{{storyContent}}"));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let templates: InstructionTemplates =
            serde_json::from_str(r#"{"continue": "Go on."}"#).unwrap();
        assert_eq!(templates.continue_story, "Go on.");
        assert_eq!(templates.custom, "Continue the story.");
    }
}
