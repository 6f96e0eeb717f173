//! Capability-tagged generation back-ends behind one entry point

use crate::cancel::CancelSignal;
use crate::config::GenerationOptions;
use crate::error::ProviderError;
use crate::horde::{GenerationStream, JobOrchestrator};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use storyloom_protocol::{GenerationEvent, GenerationResult};

/// Incremental text chunks from a token-streaming client
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub streaming: bool,
    pub reasoning: bool,
    /// Largest context window in tokens, when the back-end has a fixed one
    pub max_context_window: Option<u32>,
    pub requires_polling: bool,
}

impl Capabilities {
    pub const QUEUE_BASED: Self = Self {
        streaming: false,
        reasoning: false,
        max_context_window: Some(8192),
        requires_polling: true,
    };

    pub const SYNCHRONOUS: Self = Self {
        streaming: false,
        reasoning: false,
        max_context_window: None,
        requires_polling: false,
    };

    pub const STREAMING: Self = Self {
        streaming: true,
        reasoning: false,
        max_context_window: None,
        requires_polling: false,
    };
}

/// Back-end answering a prompt in a single call
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::SYNCHRONOUS
    }
}

/// Back-end streaming tokens as they are generated
#[async_trait]
pub trait StreamingCompletionClient: Send + Sync {
    async fn complete_stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<DeltaStream, ProviderError>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::STREAMING
    }
}

/// Every supported way of producing a generation
#[derive(Clone)]
pub enum GenerationBackend {
    QueueBased(JobOrchestrator),
    SynchronousCall(Arc<dyn CompletionClient>),
    StreamingCall(Arc<dyn StreamingCompletionClient>),
}

impl GenerationBackend {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::QueueBased(orchestrator) => orchestrator.capabilities(),
            Self::SynchronousCall(client) => client.capabilities(),
            Self::StreamingCall(client) => client.capabilities(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QueueBased(_) => "queue",
            Self::SynchronousCall(_) => "synchronous",
            Self::StreamingCall(_) => "streaming",
        }
    }

    /// Produce one complete result
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError> {
        match self {
            Self::QueueBased(orchestrator) => {
                orchestrator
                    .generate(system_prompt, user_prompt, options)
                    .await
            }
            Self::SynchronousCall(client) => {
                let cancel = options.cancel.clone().unwrap_or_default();
                cancel
                    .run(client.complete(system_prompt, user_prompt, options))
                    .await
            }
            Self::StreamingCall(client) => {
                let cancel = options.cancel.clone().unwrap_or_default();
                let mut deltas = cancel
                    .run(client.complete_stream(system_prompt, user_prompt, options))
                    .await?;

                let mut content = String::new();
                while let Some(delta) = next_delta(&cancel, &mut deltas).await? {
                    content.push_str(&delta);
                }

                Ok(GenerationResult {
                    content,
                    ..Default::default()
                })
            }
        }
    }

    /// Produce a stream of events ending in exactly one `Complete`
    pub fn generate_streaming(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        options: GenerationOptions,
    ) -> GenerationStream {
        let system_prompt = system_prompt.into();
        let user_prompt = user_prompt.into();
        match self {
            Self::QueueBased(orchestrator) => {
                orchestrator.generate_with_status(system_prompt, user_prompt, options)
            }
            Self::SynchronousCall(client) => Box::pin(single_result_stream(
                client.clone(),
                system_prompt,
                user_prompt,
                options,
            )),
            Self::StreamingCall(client) => Box::pin(delta_event_stream(
                client.clone(),
                system_prompt,
                user_prompt,
                options,
            )),
        }
    }
}

async fn next_delta(
    cancel: &CancelSignal,
    deltas: &mut DeltaStream,
) -> Result<Option<String>, ProviderError> {
    match cancel.run(async { Ok(deltas.next().await) }).await? {
        Some(delta) => delta.map(Some),
        None => Ok(None),
    }
}

fn single_result_stream(
    client: Arc<dyn CompletionClient>,
    system_prompt: String,
    user_prompt: String,
    options: GenerationOptions,
) -> impl Stream<Item = Result<GenerationEvent, ProviderError>> + Send {
    try_stream! {
        let cancel = options.cancel.clone().unwrap_or_default();
        let result = cancel
            .run(client.complete(&system_prompt, &user_prompt, &options))
            .await?;
        yield GenerationEvent::Complete {
            content: result.content,
            usage: result.usage,
            metadata: result.metadata,
        };
    }
}

fn delta_event_stream(
    client: Arc<dyn StreamingCompletionClient>,
    system_prompt: String,
    user_prompt: String,
    options: GenerationOptions,
) -> impl Stream<Item = Result<GenerationEvent, ProviderError>> + Send {
    try_stream! {
        let cancel = options.cancel.clone().unwrap_or_default();
        let mut deltas = cancel
            .run(client.complete_stream(&system_prompt, &user_prompt, &options))
            .await?;

        let mut content = String::new();
        while let Some(text) = next_delta(&cancel, &mut deltas).await? {
            content.push_str(&text);
            yield GenerationEvent::Delta { text };
        }

        yield GenerationEvent::Complete {
            content,
            usage: Default::default(),
            metadata: Default::default(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        async fn complete(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResult, ProviderError> {
            Ok(GenerationResult {
                content: user_prompt.to_uppercase(),
                ..Default::default()
            })
        }
    }

    struct ChunkClient {
        chunks: Vec<&'static str>,
    }

    #[async_trait]
    impl StreamingCompletionClient for ChunkClient {
        async fn complete_stream(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<DeltaStream, ProviderError> {
            let chunks: Vec<Result<String, ProviderError>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    #[tokio::test]
    async fn test_synchronous_backend() {
        let backend = GenerationBackend::SynchronousCall(Arc::new(EchoClient));
        let result = backend
            .generate("sys", "hello", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.content, "HELLO");
        assert!(!backend.capabilities().streaming);

        let events: Vec<_> = backend
            .generate_streaming("sys", "hi", GenerationOptions::default())
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(events[0].as_ref().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_streaming_backend_collects_deltas() {
        let backend = GenerationBackend::StreamingCall(Arc::new(ChunkClient {
            chunks: vec!["Once ", "upon ", "a time"],
        }));
        assert!(backend.capabilities().streaming);

        let result = backend
            .generate("sys", "go", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.content, "Once upon a time");

        let events: Vec<GenerationEvent> = backend
            .generate_streaming("sys", "go", GenerationOptions::default())
            .map(|event| event.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[3],
            GenerationEvent::Complete {
                content: "Once upon a time".to_string(),
                usage: Default::default(),
                metadata: Default::default(),
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_synchronous_call() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let backend = GenerationBackend::SynchronousCall(Arc::new(EchoClient));
        let err = backend
            .generate("sys", "x", &GenerationOptions::default().with_cancel(cancel))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_queue_capabilities() {
        let caps = Capabilities::QUEUE_BASED;
        assert!(caps.requires_polling);
        assert_eq!(caps.max_context_window, Some(8192));
    }
}
