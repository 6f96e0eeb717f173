//! Provider error types

use thiserror::Error;

/// Stable category surfaced to callers and UIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Auth,
    Timeout,
    Queue,
    Cancelled,
    Generic,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "AUTH_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Queue => "QUEUE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Generic => "GENERIC",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("transport error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    #[error("job submission rejected: {message}")]
    SubmitRejected { status: Option<u16>, message: String },

    #[error("generation faulted on the remote service (job {job_id})")]
    Faulted { job_id: String },

    #[error("generation timed out after {elapsed_ms}ms (job {job_id})")]
    TimedOut { job_id: String, elapsed_ms: u64 },

    #[error("generation cancelled")]
    Cancelled,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0} is not supported by this back-end")]
    Unsupported(&'static str),
}

impl ProviderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthenticationFailed(_) => ErrorCode::Auth,
            Self::Timeout(_) | Self::TimedOut { .. } => ErrorCode::Timeout,
            Self::Queue(_) => ErrorCode::Queue,
            Self::Cancelled => ErrorCode::Cancelled,
            _ => ErrorCode::Generic,
        }
    }

    /// Friendly text for the error's category; generic errors keep their own message
    pub fn user_message(&self) -> String {
        match self.code() {
            ErrorCode::Auth => "Invalid API key".to_string(),
            ErrorCode::Timeout => {
                "Generation timed out. Try again or use faster workers.".to_string()
            }
            ErrorCode::Queue => "Queue error. Please try again.".to_string(),
            ErrorCode::Cancelled => "Generation cancelled".to_string(),
            ErrorCode::Generic => self.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
