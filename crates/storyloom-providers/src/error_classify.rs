//! Error classification based on status codes and message content
//!
//! Structured status codes win; message sniffing is only a fallback for
//! transports that report everything as a generic failure.

use crate::error::ProviderError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref AUTH_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b401\b").unwrap(),
        Regex::new(r"(?i)invalid[_\s]?api[_\s]?key").unwrap(),
        Regex::new(r"(?i)unauthori[sz]ed").unwrap(),
    ];

    static ref TIMEOUT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)timeout").unwrap(),
        Regex::new(r"(?i)timed out").unwrap(),
    ];

    static ref QUEUE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)queue").unwrap(),
        Regex::new(r"(?i)too many (?:requests|concurrent)").unwrap(),
        Regex::new(r"(?i)rate[_\s]?limit").unwrap(),
    ];
}

fn matches_any(patterns: &[Regex], message: &str) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(message))
}

/// Check if message matches auth patterns
fn is_auth(message: &str) -> bool {
    matches_any(&AUTH_PATTERNS, message)
}

/// Check if message matches timeout patterns
fn is_timeout(message: &str) -> bool {
    matches_any(&TIMEOUT_PATTERNS, message)
}

/// Check if message matches queue patterns
fn is_queue(message: &str) -> bool {
    matches_any(&QUEUE_PATTERNS, message)
}

/// Classify a transport failure
///
/// Unclassified failures pass through as `ProviderError::Transport` with
/// the original status and message.
pub fn classify_error(status: Option<u16>, message: &str) -> ProviderError {
    match status {
        Some(401) | Some(403) => {
            return ProviderError::AuthenticationFailed(message.to_string());
        }
        Some(408) | Some(504) => return ProviderError::Timeout(message.to_string()),
        Some(429) => return ProviderError::Queue(message.to_string()),
        _ => {}
    }

    if is_auth(message) {
        return ProviderError::AuthenticationFailed(message.to_string());
    }

    if is_timeout(message) {
        return ProviderError::Timeout(message.to_string());
    }

    if is_queue(message) {
        return ProviderError::Queue(message.to_string());
    }

    ProviderError::Transport {
        status,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_detection() {
        assert!(is_auth("Invalid API Key"));
        assert!(is_auth("HTTP 401"));
        assert!(is_auth("Unauthorized"));
        assert!(!is_auth("some other error"));
    }

    #[test]
    fn test_timeout_detection() {
        assert!(is_timeout("Request timeout"));
        assert!(is_timeout("operation timed out"));
        assert!(!is_timeout("time is up"));
    }

    #[test]
    fn test_queue_detection() {
        assert!(is_queue("Queue is full"));
        assert!(is_queue("Too many concurrent requests"));
        assert!(!is_queue("bad prompt"));
    }

    #[test]
    fn test_status_takes_precedence() {
        assert!(matches!(
            classify_error(Some(403), "queue full"),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_error(Some(429), "invalid api key"),
            ProviderError::Queue(_)
        ));
        assert!(matches!(
            classify_error(Some(504), "gateway"),
            ProviderError::Timeout(_)
        ));
    }

    #[test]
    fn test_message_fallback() {
        assert!(matches!(
            classify_error(None, "401 Invalid API Key"),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_error(Some(500), "upstream timeout"),
            ProviderError::Timeout(_)
        ));
    }

    #[test]
    fn test_generic_passthrough() {
        match classify_error(Some(400), "prompt too long") {
            ProviderError::Transport { status, message } => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "prompt too long");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
