//! System and generation prompt assembly

use crate::macros::{MacroContext, MacroProcessor};
use crate::sections::{
    build_character_profile, build_character_profiles, build_instructions, build_persona,
    build_perspective, build_world_info, FieldRenderer, SectionHeaders, PREAMBLE,
};
use crate::templates::InstructionTemplates;
use crate::truncate::story_block;
use serde::{Deserialize, Serialize};
use storyloom_protocol::{GenerationRequestParams, GenerationType, PromptContext};

const STORY_PLACEHOLDER: &str = "{{storyContent}}";

fn default_max_context_chars() -> usize {
    64000
}

fn default_true() -> bool {
    true
}

/// Prompt assembly settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Trailing story characters kept when a request sets no limit
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Spell out the third-person past tense rules
    #[serde(default = "default_true")]
    pub detailed_perspective: bool,

    #[serde(default)]
    pub instruction_templates: InstructionTemplates,

    #[serde(default)]
    pub section_headers: SectionHeaders,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            detailed_perspective: true,
            instruction_templates: InstructionTemplates::default(),
            section_headers: SectionHeaders::default(),
        }
    }
}

/// Builds the system prompt and the generation instruction
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Compose the sectioned system prompt for a story
    pub fn build_system_prompt(&self, context: &PromptContext) -> String {
        let user_name = context.user_name();
        let char_name = context.char_name();
        let macros = MacroProcessor::new(MacroContext::new(user_name, char_name));
        let renderer = FieldRenderer::new(&macros, user_name, char_name);
        let headers = &self.config.section_headers;

        let mut prompt = String::from(PREAMBLE);

        match context.character_cards.as_slice() {
            [] => {}
            [card] => prompt.push_str(&build_character_profile(
                card,
                &context.settings,
                &renderer,
                headers,
            )),
            cards => prompt.push_str(&build_character_profiles(cards, &renderer, headers)),
        }

        prompt.push_str(&build_world_info(
            &context.activated_lorebooks,
            &context.settings,
            &renderer,
            headers,
        ));
        prompt.push_str(&build_persona(context.named_persona(), &renderer, headers));
        prompt.push_str(&build_instructions(headers));
        prompt.push_str(&build_perspective(
            headers,
            self.config.detailed_perspective,
        ));

        tracing::debug!(
            cards = context.character_cards.len(),
            lorebooks = context.activated_lorebooks.len(),
            chars = prompt.len(),
            "Built system prompt"
        );

        prompt
    }

    /// Compose the story block plus instruction for one generation
    pub fn build_generation_prompt(
        &self,
        generation_type: GenerationType,
        params: &GenerationRequestParams,
    ) -> String {
        let limit = params
            .max_chars
            .filter(|limit| *limit > 0)
            .unwrap_or(self.config.max_context_chars);
        let story = params.story_content.as_deref().unwrap_or("");
        let character = params
            .character_name
            .as_deref()
            .filter(|name| !name.is_empty());
        let custom = params
            .custom_instruction
            .as_deref()
            .filter(|instruction| !instruction.is_empty());

        if let Some(template) = params.template_text.as_deref().filter(|t| !t.is_empty()) {
            let mut instruction = template.to_string();
            if let Some(name) = character {
                instruction = instruction
                    .replace("{{charName}}", name)
                    .replace("{{char}}", name);
            }
            if let Some(custom) = custom {
                instruction = instruction.replace("{{instruction}}", custom);
            }
            if !story.is_empty() {
                instruction = instruction.replace(STORY_PLACEHOLDER, story);
            }

            let story_context = if template.contains(STORY_PLACEHOLDER) {
                String::new()
            } else {
                story_block(story, limit)
            };
            return story_context + &instruction;
        }

        let templates = &self.config.instruction_templates;
        let instruction = match generation_type {
            GenerationType::Continue => templates.continue_story.clone(),
            GenerationType::Character => templates
                .character
                .replace("{{charName}}", character.unwrap_or("the character")),
            GenerationType::Custom => custom.unwrap_or(&templates.custom).to_string(),
            GenerationType::Other => templates.custom.clone(),
        };

        story_block(story, limit) + &instruction
    }

    /// Generation prompt for the type carried by the request itself
    pub fn build_request_prompt(&self, params: &GenerationRequestParams) -> String {
        self.build_generation_prompt(params.generation_type, params)
    }
}
