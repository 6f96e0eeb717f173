//! Story truncation and size estimates

use std::borrow::Cow;

/// Marker prepended when older story text was dropped
pub const ELLIPSIS: &str = "...";

const STORY_BLOCK_HEADER: &str = "Here is the current story so far:\n\n";
const STORY_BLOCK_FOOTER: &str = "\n\n---\n\n";

/// Keep at most `limit` trailing characters of `content`
///
/// Longer content comes back as `ELLIPSIS` followed by exactly `limit`
/// characters; anything shorter is returned untouched.
pub fn truncate_tail(content: &str, limit: usize) -> Cow<'_, str> {
    let total = content.chars().count();
    if total <= limit {
        return Cow::Borrowed(content);
    }

    let start = content
        .char_indices()
        .nth(total - limit)
        .map(|(index, _)| index)
        .unwrap_or(content.len());

    Cow::Owned(format!("{}{}", ELLIPSIS, &content[start..]))
}

/// Frame the most recent story text for the generation prompt
///
/// Blank content contributes nothing.
pub fn story_block(content: &str, limit: usize) -> String {
    if content.trim().is_empty() {
        return String::new();
    }

    format!(
        "{}{}{}",
        STORY_BLOCK_HEADER,
        truncate_tail(content, limit),
        STORY_BLOCK_FOOTER
    )
}

/// Estimate tokens for a string (~4 chars per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_trailing_chars() {
        let truncated = truncate_tail("abcdefghij", 4);
        assert_eq!(truncated, "...ghij");
        assert_eq!(truncated.len() - ELLIPSIS.len(), 4);
    }

    #[test]
    fn test_short_content_unmodified() {
        assert!(matches!(truncate_tail("abc", 3), Cow::Borrowed("abc")));
        assert_eq!(truncate_tail("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let truncated = truncate_tail("héllo wörld", 5);
        assert_eq!(truncated, "...wörld");
    }

    #[test]
    fn test_story_block_framing() {
        let block = story_block("The ship sank.", 100);
        assert_eq!(
            block,
            "Here is the current story so far:\n\nThe ship sank.\n\n---\n\n"
        );
    }

    #[test]
    fn test_story_block_blank_is_empty() {
        assert_eq!(story_block("   \n\t", 100), "");
        assert_eq!(story_block("", 100), "");
    }

    #[test]
    fn test_estimate_tokens() {
        // 20 chars should be ~5 tokens
        assert_eq!(estimate_tokens("12345678901234567890"), 5);
    }
}
