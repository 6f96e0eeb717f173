//! Storyloom Prompts - Macro expansion and prompt assembly
//!
//! - [`MacroProcessor`] expands `{{user}}`, `{{random:...}}`, `{{pick:...}}`
//!   and `{{roll:...}}` directives in a single non-recursive pass
//! - [`PromptAssembler`] builds the sectioned system prompt and the
//!   generation instruction from story state

pub mod assembler;
pub mod macros;
pub mod sections;
pub mod templates;
pub mod truncate;

pub use assembler::{PromptAssembler, PromptConfig};
pub use macros::{split_by_comma, stable_hash, MacroContext, MacroProcessor};
pub use sections::{strip_asterisks, FieldRenderer, SectionHeaders};
pub use templates::InstructionTemplates;
pub use truncate::{estimate_tokens, story_block, truncate_tail, ELLIPSIS};
