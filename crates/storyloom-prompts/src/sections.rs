use crate::macros::MacroProcessor;
use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use storyloom_protocol::{CharacterCard, LorebookEntry, Persona, PromptSettings};

lazy_static! {
    static ref USER_PLACEHOLDER: Regex = Regex::new(r"(?i)\{\{user\}\}").unwrap();
    static ref CHAR_PLACEHOLDER: Regex = Regex::new(r"(?i)\{\{(?:char|character)\}\}").unwrap();
}

pub const PREAMBLE: &str =
    "You are a creative writing assistant helping to write a novel-style story.\n\n";

/// Headings that open each system prompt section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionHeaders {
    pub character_profiles: String,
    pub character_profile: String,
    pub dialogue_examples: String,
    pub world_info: String,
    pub persona: String,
    pub instructions: String,
    pub perspective: String,
}

impl Default for SectionHeaders {
    fn default() -> Self {
        Self {
            character_profiles: "=== CHARACTER PROFILES ===".to_string(),
            character_profile: "=== CHARACTER PROFILE ===".to_string(),
            dialogue_examples: "=== DIALOGUE STYLE EXAMPLES ===".to_string(),
            world_info: "=== WORLD INFORMATION ===".to_string(),
            persona: "=== USER CHARACTER (PERSONA) ===".to_string(),
            instructions: "=== INSTRUCTIONS ===".to_string(),
            perspective: "=== PERSPECTIVE ===".to_string(),
        }
    }
}

/// Remove every `*` from model-facing text
pub fn strip_asterisks(text: &str) -> String {
    text.replace('*', "")
}

/// Runs each free-text field through placeholders, macros and asterisk removal
pub struct FieldRenderer<'a> {
    macros: &'a MacroProcessor,
    user_name: &'a str,
    char_name: &'a str,
}

impl<'a> FieldRenderer<'a> {
    pub fn new(macros: &'a MacroProcessor, user_name: &'a str, char_name: &'a str) -> Self {
        Self {
            macros,
            user_name,
            char_name,
        }
    }

    /// Render a field attributed to the active character
    pub fn render(&self, text: &str) -> String {
        self.render_for(text, self.char_name)
    }

    /// Render a field belonging to a specific character card
    pub fn render_for(&self, text: &str, char_name: &str) -> String {
        let substituted = USER_PLACEHOLDER.replace_all(text, NoExpand(self.user_name));
        let substituted = CHAR_PLACEHOLDER.replace_all(&substituted, NoExpand(char_name));
        strip_asterisks(&self.macros.process(&substituted))
    }
}

fn card_name(card: &CharacterCard) -> &str {
    if card.name.is_empty() {
        storyloom_protocol::DEFAULT_CHAR_NAME
    } else {
        &card.name
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

/// Build the multi-character profile listing
///
/// Scenarios are only included when exactly one card is listed, so
/// several characters never receive conflicting framing.
pub fn build_character_profiles(
    cards: &[CharacterCard],
    renderer: &FieldRenderer<'_>,
    headers: &SectionHeaders,
) -> String {
    if cards.is_empty() {
        return String::new();
    }

    let mut prompt = format!("{}\n\n", headers.character_profiles);

    for (index, card) in cards.iter().enumerate() {
        let name = card_name(card);
        if index > 0 {
            prompt.push_str("\n---\n\n");
        }

        prompt.push_str(&format!(
            "Character {}: {}\n",
            index + 1,
            strip_asterisks(&card.name)
        ));

        if let Some(description) = non_empty(&card.description) {
            prompt.push_str(&format!(
                "Description: {}\n",
                renderer.render_for(description, name)
            ));
        }

        if let Some(personality) = non_empty(&card.personality) {
            prompt.push_str(&format!(
                "Personality: {}\n",
                renderer.render_for(personality, name)
            ));
        }

        if cards.len() == 1 {
            if let Some(scenario) = non_empty(&card.scenario) {
                prompt.push_str(&format!(
                    "Scenario: {}\n",
                    renderer.render_for(scenario, name)
                ));
            }
        }
    }

    prompt.push('\n');
    prompt
}

/// Build the richer profile used when a single character is present
pub fn build_character_profile(
    card: &CharacterCard,
    settings: &PromptSettings,
    renderer: &FieldRenderer<'_>,
    headers: &SectionHeaders,
) -> String {
    let name = card_name(card);
    let mut prompt = format!("{}\n", headers.character_profile);
    prompt.push_str(&format!("Name: {}\n", strip_asterisks(&card.name)));

    if let Some(description) = non_empty(&card.description) {
        prompt.push_str(&format!(
            "Description: {}\n",
            renderer.render_for(description, name)
        ));
    }

    if let Some(personality) = non_empty(&card.personality) {
        prompt.push_str(&format!(
            "Personality: {}\n",
            renderer.render_for(personality, name)
        ));
    }

    if let Some(scenario) = non_empty(&card.scenario) {
        prompt.push_str(&format!(
            "\nCurrent Scenario: {}\n",
            renderer.render_for(scenario, name)
        ));
    }

    if settings.dialogue_examples_enabled() {
        if let Some(examples) = non_empty(&card.dialogue_examples) {
            prompt.push_str(&format!(
                "\n{}\n{}\n",
                headers.dialogue_examples,
                renderer.render_for(examples, name)
            ));
        }
    }

    prompt
}

/// Build the world information section, keeping activation order
pub fn build_world_info(
    entries: &[LorebookEntry],
    settings: &PromptSettings,
    renderer: &FieldRenderer<'_>,
    headers: &SectionHeaders,
) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let body = entries
        .iter()
        .map(|entry| {
            let content = renderer.render(&entry.content);
            match non_empty(&entry.comment) {
                Some(comment) if settings.show_prompt => {
                    format!("<!-- {} -->\n{}", strip_asterisks(comment), content)
                }
                _ => content,
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("\n{}\n\n{}\n", headers.world_info, body)
}

/// Build the persona section; empty unless the persona is named
pub fn build_persona(
    persona: Option<&Persona>,
    renderer: &FieldRenderer<'_>,
    headers: &SectionHeaders,
) -> String {
    let Some(persona) = persona.filter(|p| !p.name.is_empty()) else {
        return String::new();
    };

    let mut prompt = format!("\n{}\n", headers.persona);
    prompt.push_str(&format!("Name: {}\n", strip_asterisks(&persona.name)));

    if let Some(description) = non_empty(&persona.description) {
        prompt.push_str(&format!("Description: {}\n", renderer.render(description)));
    }

    if let Some(style) = non_empty(&persona.writing_style) {
        prompt.push_str(&format!("Writing Style: {}\n", renderer.render(style)));
    }

    prompt
}

pub fn build_instructions(headers: &SectionHeaders) -> String {
    let mut prompt = format!("\n{}\n", headers.instructions);
    prompt.push_str("Write in a narrative, novel-style format with proper paragraphs and dialogue.\n");
    prompt.push_str("Maintain consistency with established characters and plot.\n");
    prompt.push_str(
        "Focus on showing rather than telling, with vivid descriptions and natural dialogue.\n",
    );
    prompt
}

/// Build the perspective rules
///
/// The prompt itself must stay free of asterisks, so the rule against
/// them is worded without the character.
pub fn build_perspective(headers: &SectionHeaders, detailed: bool) -> String {
    let mut prompt = format!("\n{}\n", headers.perspective);
    prompt.push_str("Write in third-person past tense perspective.\n");

    if detailed {
        prompt.push_str(
            "Use he/she/they pronouns and past tense verbs (said, walked, thought, etc.).\n",
        );
        prompt.push_str("Do NOT use first-person (I, me, my, we) or present tense.\n");
        prompt.push_str("All narrative and dialogue tags should be in past tense.\n");
    }

    prompt.push_str("\nDo not use asterisks for actions. Write everything as prose.\n");
    prompt
}
