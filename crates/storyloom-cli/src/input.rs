//! Story context files and request parameters

use crate::commands::PromptArgs;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use storyloom_protocol::{GenerationRequestParams, GenerationType, PromptContext};

/// Read a story context from JSON, or YAML when the extension says so
pub fn load_context(path: &Path) -> Result<PromptContext> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read story context: {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml" | "yaml")
    );

    if is_yaml {
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Invalid story context: {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid story context: {}", path.display()))
    }
}

/// Fill in the dialogue-examples toggle when the story leaves it unset
pub fn apply_defaults(context: &mut PromptContext, include_dialogue_examples: bool) {
    context
        .settings
        .include_dialogue_examples
        .get_or_insert(include_dialogue_examples);
}

pub fn request_params(args: &PromptArgs, context: &PromptContext) -> GenerationRequestParams {
    // FromStr for GenerationType is infallible
    let generation_type: GenerationType = args
        .generation_type
        .parse()
        .unwrap_or(GenerationType::Other);

    let mut params = GenerationRequestParams::new(generation_type);
    if !context.story.content.is_empty() {
        params = params.with_story(context.story.content.clone());
    }

    let character = args
        .character
        .clone()
        .or_else(|| context.active_character().map(|card| card.name.clone()));
    if let Some(name) = character {
        params = params.with_character(name);
    }
    if let Some(instruction) = &args.instruction {
        params = params.with_instruction(instruction.clone());
    }
    if let Some(template) = &args.template {
        params = params.with_template(template.clone());
    }
    if let Some(max_chars) = args.max_chars {
        params = params.with_max_chars(max_chars);
    }

    params
}
