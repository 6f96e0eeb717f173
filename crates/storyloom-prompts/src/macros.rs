//! Inline macro expansion
//!
//! Macros are expanded in three fixed phases:
//! 1. context macros (`{{user}}`, `{{char}}`, `{{character}}`)
//! 2. selection macros (`{{random:a,b}}`, `{{random::a::b}}`, `{{pick:...}}`)
//! 3. dice rolls (`{{roll:2d6+3}}`)
//!
//! Each phase only scans text that no earlier phase produced, so an
//! expansion is never re-scanned. Malformed macros stay as literal text.

use lazy_static::lazy_static;
use rand::Rng;
use regex::{Captures, Regex};
use storyloom_protocol::{DEFAULT_CHAR_NAME, DEFAULT_USER_NAME};
use tracing::debug;

const MAX_DICE_COUNT: u32 = 100;

lazy_static! {
    static ref CONTEXT_MACRO: Regex = Regex::new(r"(?i)\{\{(user|char|character)\}\}").unwrap();
    static ref SELECTION_MACRO: Regex =
        Regex::new(r"(?i)\{\{(random|pick)(::?)([^}]+)\}\}").unwrap();
    static ref DICE_MACRO: Regex = Regex::new(r"(?i)\{\{roll:(\d*)d(\d+)([+-]\d+)?\}\}").unwrap();
}

/// Names substituted by the context macros; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroContext {
    user_name: String,
    char_name: String,
}

impl MacroContext {
    pub fn new(user_name: impl Into<String>, char_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        let char_name = char_name.into();
        Self {
            user_name: if user_name.is_empty() {
                DEFAULT_USER_NAME.to_string()
            } else {
                user_name
            },
            char_name: if char_name.is_empty() {
                DEFAULT_CHAR_NAME.to_string()
            } else {
                char_name
            },
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn char_name(&self) -> &str {
        &self.char_name
    }
}

impl Default for MacroContext {
    fn default() -> Self {
        Self::new(DEFAULT_USER_NAME, DEFAULT_CHAR_NAME)
    }
}

#[derive(Debug)]
enum Segment {
    /// Original text, still open to later phases
    Raw(String),
    /// Output of an expansion, emitted as-is
    Expanded(String),
}

impl Segment {
    fn into_text(self) -> String {
        match self {
            Self::Raw(text) | Self::Expanded(text) => text,
        }
    }
}

/// Expands macros for one prompt construction
#[derive(Debug, Clone, Default)]
pub struct MacroProcessor {
    context: MacroContext,
}

impl MacroProcessor {
    pub fn new(context: MacroContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &MacroContext {
        &self.context
    }

    /// Expand every macro in `text`
    ///
    /// Never fails: anything that does not parse is left verbatim.
    pub fn process(&self, text: &str) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }

        let segments = vec![Segment::Raw(text.to_string())];
        let segments = expand_phase(segments, &CONTEXT_MACRO, |caps| {
            Some(self.context_value(&caps[1]).to_string())
        });
        let segments = expand_phase(segments, &SELECTION_MACRO, expand_selection);
        let segments = expand_phase(segments, &DICE_MACRO, expand_dice);

        segments.into_iter().map(Segment::into_text).collect()
    }

    fn context_value(&self, name: &str) -> &str {
        if name.eq_ignore_ascii_case("user") {
            self.context.user_name()
        } else {
            self.context.char_name()
        }
    }
}

/// Run one macro pattern over the raw segments, splitting out expansions
fn expand_phase<F>(segments: Vec<Segment>, pattern: &Regex, mut expand: F) -> Vec<Segment>
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let mut output = Vec::with_capacity(segments.len());

    for segment in segments {
        let text = match segment {
            Segment::Raw(text) => text,
            expanded => {
                output.push(expanded);
                continue;
            }
        };

        let mut last = 0;
        for caps in pattern.captures_iter(&text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let Some(replacement) = expand(&caps) else {
                continue;
            };
            if whole.start() > last {
                output.push(Segment::Raw(text[last..whole.start()].to_string()));
            }
            output.push(Segment::Expanded(replacement));
            last = whole.end();
        }

        if last < text.len() {
            output.push(Segment::Raw(text[last..].to_string()));
        }
    }

    output
}

fn expand_selection(caps: &Captures<'_>) -> Option<String> {
    let options = parse_options(&caps[2], &caps[3]);
    if options.is_empty() {
        debug!(macro_text = &caps[0], "Selection macro has no options, leaving as-is");
        return None;
    }

    let index = if caps[1].eq_ignore_ascii_case("random") {
        rand::thread_rng().gen_range(0..options.len())
    } else {
        pick_index(&caps[0], options.len())
    };

    options.into_iter().nth(index)
}

fn parse_options(delimiter: &str, args: &str) -> Vec<String> {
    let parts = if delimiter == "::" {
        args.split("::").map(str::to_string).collect()
    } else {
        split_by_comma(args)
    };

    parts
        .into_iter()
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty())
        .collect()
}

/// Split on commas, treating `\,` as a literal comma
pub fn split_by_comma(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in text.chars() {
        if ch == '\\' && !escaped {
            escaped = true;
            continue;
        }

        if ch == ',' && !escaped {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }

        escaped = false;
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// 32-bit rolling hash over the UTF-16 code units of `text`
///
/// Keyed on the exact occurrence text, so `{{pick:a,b}}` and
/// `{{pick::a::b}}` can resolve differently.
pub fn stable_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

fn pick_index(occurrence: &str, option_count: usize) -> usize {
    stable_hash(occurrence).unsigned_abs() as usize % option_count
}

fn expand_dice(caps: &Captures<'_>) -> Option<String> {
    let count = match caps.get(1).map(|m| m.as_str()).filter(|s| !s.is_empty()) {
        Some(count) => count.parse::<u32>().ok()?,
        None => 1,
    };
    let size = caps[2].parse::<u32>().ok()?;
    let modifier = match caps.get(3) {
        Some(modifier) => modifier.as_str().parse::<i64>().ok()?,
        None => 0,
    };

    if size == 0 || count == 0 || count > MAX_DICE_COUNT {
        debug!(macro_text = &caps[0], "Dice macro out of range, leaving as-is");
        return None;
    }

    let mut rng = rand::thread_rng();
    let rolled: i64 = (0..count)
        .map(|_| i64::from(rng.gen_range(1..=size)))
        .sum();

    rolled.checked_add(modifier).map(|total| total.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn processor() -> MacroProcessor {
        MacroProcessor::new(MacroContext::new("Sam", "Aria"))
    }

    #[test]
    fn test_plain_text_unchanged() {
        let text = "No macros here, just {braces} and a } stray.";
        assert_eq!(processor().process(text), text);
        assert_eq!(processor().process(""), "");
    }

    #[test]
    fn test_context_macros_case_insensitive() {
        let p = processor();
        assert_eq!(p.process("{{user}} met {{char}}"), "Sam met Aria");
        assert_eq!(p.process("{{User}}"), p.process("{{user}}"));
        assert_eq!(p.process("{{USER}}"), "Sam");
        assert_eq!(p.process("{{Character}} waved"), "Aria waved");
    }

    #[test]
    fn test_context_defaults_never_empty() {
        let context = MacroContext::new("", "");
        assert_eq!(context.user_name(), "User");
        assert_eq!(context.char_name(), "Character");
    }

    #[test]
    fn test_random_picks_from_options_with_full_coverage() {
        let p = processor();
        let mut seen = HashSet::new();
        for _ in 0..300 {
            let value = p.process("{{random:a,b,c}}");
            assert!(["a", "b", "c"].contains(&value.as_str()), "got {value}");
            seen.insert(value);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_random_double_colon_splits_on_token_only() {
        let p = processor();
        for _ in 0..50 {
            let value = p.process("{{random::red, blue::green}}");
            assert!(["red, blue", "green"].contains(&value.as_str()), "got {value}");
        }
    }

    #[test]
    fn test_pick_is_stable() {
        let p = processor();
        let first = p.process("{{pick:a,b,c}}");
        for _ in 0..20 {
            assert_eq!(p.process("{{pick:a,b,c}}"), first);
        }
        assert!(["a", "b", "c"].contains(&first.as_str()));

        let double = p.process("{{pick::a::b::c}}");
        assert!(["a", "b", "c"].contains(&double.as_str()));
    }

    #[test]
    fn test_pick_index_follows_occurrence_hash() {
        let text = "{{pick:a,b,c}}";
        let expected = ["a", "b", "c"][stable_hash(text).unsigned_abs() as usize % 3];
        assert_eq!(processor().process(text), expected);
    }

    #[test]
    fn test_stable_hash_matches_rolling_formula() {
        assert_eq!(stable_hash(""), 0);
        assert_eq!(stable_hash("a"), 97);
        assert_eq!(stable_hash("ab"), 97 * 31 + 98);
        // long inputs wrap instead of overflowing
        let _ = stable_hash(&"z".repeat(10_000));
    }

    #[test]
    fn test_empty_selection_left_verbatim() {
        let p = processor();
        assert_eq!(p.process("{{random:, ,}}"), "{{random:, ,}}");
        assert_eq!(p.process("{{pick::::}}"), "{{pick::::}}");
    }

    #[test]
    fn test_split_by_comma_escapes() {
        assert_eq!(split_by_comma(r"a\,b,c"), vec!["a,b", "c"]);
        assert_eq!(split_by_comma("a,,b"), vec!["a", "", "b"]);
        assert_eq!(split_by_comma("a,"), vec!["a"]);
    }

    #[test]
    fn test_escaped_comma_inside_macro() {
        let p = processor();
        for _ in 0..50 {
            let value = p.process(r"{{random:x\,y,z}}");
            assert!(["x,y", "z"].contains(&value.as_str()), "got {value}");
        }
    }

    #[test]
    fn test_roll_in_range() {
        let p = processor();
        for _ in 0..200 {
            let value: i64 = p.process("{{roll:2d6+3}}").parse().unwrap();
            assert!((5..=15).contains(&value), "got {value}");
        }
        for _ in 0..50 {
            let value: i64 = p.process("{{ROLL:d4-1}}").parse().unwrap();
            assert!((0..=3).contains(&value), "got {value}");
        }
    }

    #[test]
    fn test_roll_single_sided_is_deterministic() {
        assert_eq!(processor().process("{{roll:d1}}"), "1");
        assert_eq!(processor().process("{{roll:3d1+2}}"), "5");
    }

    #[test]
    fn test_invalid_rolls_left_verbatim() {
        let p = processor();
        assert_eq!(p.process("{{roll:d0}}"), "{{roll:d0}}");
        assert_eq!(p.process("{{roll:999d6}}"), "{{roll:999d6}}");
        assert_eq!(p.process("{{roll:0d6}}"), "{{roll:0d6}}");
        assert_eq!(p.process("{{roll:d99999999999}}"), "{{roll:d99999999999}}");
        assert_eq!(p.process("{{roll:abc}}"), "{{roll:abc}}");
    }

    #[test]
    fn test_expansions_are_not_rescanned() {
        let p = MacroProcessor::new(MacroContext::new("{{roll:d1}}", "{{random:x,y}}"));
        assert_eq!(p.process("{{user}} and {{char}}"), "{{roll:d1}} and {{random:x,y}}");
    }

    #[test]
    fn test_mixed_macros_in_one_text() {
        let p = processor();
        let out = p.process("{{user}} rolled {{roll:d1}} and chose {{pick:left}}.");
        assert_eq!(out, "Sam rolled 1 and chose left.");
    }
}
