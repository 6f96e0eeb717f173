//! Storyloom Providers - Text generation back-ends
//!
//! - [`JobOrchestrator`] submits a job to a queue-based service (AI Horde),
//!   polls it to a terminal state and sizes the context window from the
//!   live worker catalog
//! - [`GenerationBackend`] puts queue, single-call and token-streaming
//!   back-ends behind one `generate` / `generate_streaming` entry point

mod backend;
mod cancel;
mod config;
mod error;
mod error_classify;
mod horde;
mod transport;

pub use backend::{
    Capabilities, CompletionClient, DeltaStream, GenerationBackend, StreamingCompletionClient,
};
pub use cancel::CancelSignal;
pub use config::{
    GenerationOptions, HordeConfig, ModelSelector, ANONYMOUS_API_KEY, DEFAULT_BASE_URL,
    DEFAULT_CONTEXT_LENGTH, DEFAULT_EXCLUDED_MODELS, DEFAULT_MAX_TOKENS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_PREFERRED_MODELS, DEFAULT_SAMPLER_ORDER, DEFAULT_TIMEOUT_MS,
};
pub use error::{ErrorCode, ProviderError};
pub use error_classify::classify_error;
pub use horde::*;
pub use secrecy::{ExposeSecret, SecretString};
pub use transport::{
    error_message, Method, ReqwestTransport, Transport, TransportError, TransportRequest,
    TransportResponse,
};
