//! Submit, poll and finish one queue job per call

use super::budget::ContextBudget;
use super::catalog::{auto_select_models, ModelDescriptor, WorkerDescriptor};
use super::client::{HordeClient, JobStatus, SubmitParams, SubmitPayload};
use super::job::{Job, JobState};
use crate::backend::Capabilities;
use crate::cancel::CancelSignal;
use crate::config::{GenerationOptions, HordeConfig};
use crate::error::ProviderError;
use crate::transport::{ReqwestTransport, Transport};
use async_stream::try_stream;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use storyloom_protocol::{GenerationEvent, GenerationMetadata, GenerationResult, Usage};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lazy, finite stream of job events ending in one `Complete` or an error
pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<GenerationEvent, ProviderError>> + Send>>;

/// Models and context window resolved for a call before submission
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedJob {
    pub models: Vec<String>,
    pub budget: ContextBudget,
}

enum PollOutcome {
    Pending(JobStatus),
    Faulted(JobStatus),
    Finished(JobStatus, GenerationResult),
}

fn status_event(status: &JobStatus) -> GenerationEvent {
    GenerationEvent::Status {
        queue_position: status.queue_position,
        wait_time: status.wait_time,
        finished: status.finished,
        faulted: status.faulted,
    }
}

fn shape_result(job_id: &str, status: &JobStatus) -> Option<GenerationResult> {
    let generation = status.generations.first()?;
    Some(GenerationResult {
        content: generation.text.trim_start_matches('\n').to_string(),
        reasoning: None,
        usage: Usage {
            total_tokens: status.kudos.max(0.0).round() as u64,
        },
        metadata: GenerationMetadata {
            request_id: Some(job_id.to_string()),
            model: generation.model.clone(),
            worker: generation.worker_name.clone(),
            worker_id: generation.worker_id.clone(),
        },
    })
}

/// A submitted job being driven to a terminal state
struct ActiveJob<'a> {
    client: &'a HordeClient,
    job: Job,
    poll_interval: Duration,
    /// Fixed at submission; neither the interval nor a slow poll moves it
    deadline: Instant,
    cancel: CancelSignal,
}

impl ActiveJob<'_> {
    fn timed_out(&mut self) -> ProviderError {
        let elapsed_ms = self.job.elapsed().as_millis() as u64;
        self.job.transition(JobState::TimedOut);
        warn!(
            job_id = %self.job.id(),
            elapsed_ms,
            polls = self.job.polls(),
            "Generation job timed out"
        );
        ProviderError::TimedOut {
            job_id: self.job.id().to_string(),
            elapsed_ms,
        }
    }

    /// Wait out the interval (after the first poll), check the deadline, poll once
    async fn poll(&mut self) -> Result<PollOutcome, ProviderError> {
        if self.job.polls() > 0 {
            let wake = (Instant::now() + self.poll_interval).min(self.deadline);
            self.cancel
                .run(async move {
                    tokio::time::sleep_until(wake).await;
                    Ok(())
                })
                .await?;
        }

        if Instant::now() >= self.deadline {
            return Err(self.timed_out());
        }

        self.job.transition(JobState::Polling);
        let request = self.cancel.run(self.client.status(self.job.id()));
        let status = match tokio::time::timeout_at(self.deadline, request).await {
            Ok(status) => status?,
            Err(_) => return Err(self.timed_out()),
        };

        debug!(
            job_id = %self.job.id(),
            attempt = self.job.polls(),
            queue_position = status.queue_position,
            wait_time = status.wait_time,
            finished = status.finished,
            "Polled generation job"
        );

        if status.faulted {
            self.job.transition(JobState::Faulted);
            warn!(job_id = %self.job.id(), "Generation job faulted");
            return Ok(PollOutcome::Faulted(status));
        }

        if status.finished {
            if let Some(result) = shape_result(self.job.id(), &status) {
                self.job.transition(JobState::Finished);
                info!(
                    job_id = %self.job.id(),
                    polls = self.job.polls(),
                    elapsed_ms = self.job.elapsed().as_millis() as u64,
                    model = result.metadata.model.as_deref().unwrap_or("unknown"),
                    "Generation job finished"
                );
                return Ok(PollOutcome::Finished(status, result));
            }
        }

        Ok(PollOutcome::Pending(status))
    }

    fn fault(&self) -> ProviderError {
        ProviderError::Faulted {
            job_id: self.job.id().to_string(),
        }
    }
}

/// Drives queue-based generation jobs
///
/// Holds no per-job state; each call owns its own `Job`.
#[derive(Clone)]
pub struct JobOrchestrator {
    client: HordeClient,
}

impl JobOrchestrator {
    pub fn new(transport: Arc<dyn Transport>, config: HordeConfig) -> Self {
        Self {
            client: HordeClient::new(transport, Arc::new(config)),
        }
    }

    /// Orchestrator over the default `reqwest` transport
    pub fn from_config(config: HordeConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        let transport = ReqwestTransport::new().map_err(|e| ProviderError::Transport {
            status: e.status,
            message: e.message,
        })?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn client(&self) -> &HordeClient {
        &self.client
    }

    pub fn config(&self) -> &HordeConfig {
        self.client.config()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::QUEUE_BASED
    }

    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        self.client.list_models().await
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerDescriptor>, ProviderError> {
        self.client.list_workers().await
    }

    /// Models for this call: per-call, then configured, then auto-selected
    ///
    /// Catalog failures are logged and yield no constraint.
    pub async fn resolve_models(&self, options: &GenerationOptions) -> Vec<String> {
        if !options.models.is_empty() {
            return options.models.clone();
        }

        let config = self.config();
        if !config.models.is_empty() {
            return config.models.clone();
        }
        if !config.auto_select_models {
            return Vec::new();
        }

        let cancel = options.cancel.clone().unwrap_or_default();
        match cancel.run(self.client.list_models()).await {
            Ok(models) => {
                let selected = auto_select_models(&models, &config.model_selector);
                debug!(available = models.len(), selected = ?selected, "Auto-selected models");
                selected
            }
            Err(error) => {
                warn!(error = %error, "Failed to fetch model catalog, submitting without model constraint");
                Vec::new()
            }
        }
    }

    /// Resolve models and the context budget without submitting anything
    pub async fn prepare(&self, options: &GenerationOptions) -> PreparedJob {
        let models = self.resolve_models(options).await;
        let config = self.config();

        let budget = match options.max_context_length {
            Some(context_length) => ContextBudget::from_tokens(context_length, options.max_tokens),
            None if !models.is_empty() => {
                let cancel = options.cancel.clone().unwrap_or_default();
                match cancel.run(self.client.list_workers()).await {
                    Ok(workers) => ContextBudget::from_workers(
                        &workers,
                        &models,
                        config.default_context_length,
                        options.max_tokens,
                    ),
                    Err(error) => {
                        warn!(error = %error, "Failed to fetch worker catalog, using default context length");
                        ContextBudget::from_tokens(
                            config.default_context_length,
                            options.max_tokens,
                        )
                    }
                }
            }
            None => ContextBudget::from_tokens(config.default_context_length, options.max_tokens),
        };

        debug!(
            models = ?models,
            context_tokens = budget.context_tokens,
            max_chars = budget.max_chars,
            "Prepared generation job"
        );

        PreparedJob { models, budget }
    }

    fn build_payload(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
        prepared: PreparedJob,
    ) -> SubmitPayload {
        let config = self.config();
        SubmitPayload {
            prompt: format!("{}\n\n{}", system_prompt, user_prompt),
            params: SubmitParams {
                n: 1,
                max_length: options.max_tokens,
                max_context_length: prepared.budget.context_tokens,
                temperature: options.temperature,
                rep_pen: options.rep_pen,
                rep_pen_range: options.rep_pen_range,
                rep_pen_slope: options.rep_pen_slope,
                top_p: options.top_p,
                top_k: options.top_k,
                top_a: options.top_a,
                typical: options.typical,
                tfs: options.tfs,
                min_p: options.min_p,
                sampler_order: options.sampler_order.clone(),
                use_default_badwordsids: true,
                stop_sequence: options.stop_sequences.clone(),
            },
            models: prepared.models,
            workers: config.workers.clone(),
            trusted_workers: config.trusted_workers.then_some(true),
            slow_workers: (!config.slow_workers).then_some(false),
        }
    }

    async fn start(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<ActiveJob<'_>, ProviderError> {
        self.config().validate()?;
        let cancel = options.cancel.clone().unwrap_or_default();

        let prepared = self.prepare(options).await;
        let payload = self.build_payload(system_prompt, user_prompt, options, prepared);
        let job_id = cancel.run(self.client.submit(&payload)).await?;

        info!(
            job_id = %job_id,
            models = ?payload.models,
            max_context_length = payload.params.max_context_length,
            "Submitted generation job"
        );

        let job = Job::new(job_id);
        let deadline = job.submitted_at() + options.timeout;
        Ok(ActiveJob {
            client: &self.client,
            job,
            poll_interval: self.config().poll_interval,
            deadline,
            cancel,
        })
    }

    /// Run one job to completion
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError> {
        let mut active = self.start(system_prompt, user_prompt, options).await?;
        loop {
            match active.poll().await? {
                PollOutcome::Pending(_) => {}
                PollOutcome::Faulted(_) => return Err(active.fault()),
                PollOutcome::Finished(_, result) => return Ok(result),
            }
        }
    }

    /// Run one job, reporting a status event per poll before completion
    ///
    /// Nothing is submitted until the stream is first polled.
    pub fn generate_with_status(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        options: GenerationOptions,
    ) -> GenerationStream {
        Box::pin(status_stream(
            self.clone(),
            system_prompt.into(),
            user_prompt.into(),
            options,
        ))
    }
}

fn status_stream(
    orchestrator: JobOrchestrator,
    system_prompt: String,
    user_prompt: String,
    options: GenerationOptions,
) -> impl Stream<Item = Result<GenerationEvent, ProviderError>> + Send {
    try_stream! {
        let mut active = orchestrator.start(&system_prompt, &user_prompt, &options).await?;
        loop {
            match active.poll().await? {
                PollOutcome::Pending(status) => {
                    yield status_event(&status);
                }
                PollOutcome::Faulted(status) => {
                    yield status_event(&status);
                    Err::<(), _>(active.fault())?;
                }
                PollOutcome::Finished(status, result) => {
                    yield status_event(&status);
                    yield GenerationEvent::Complete {
                        content: result.content,
                        usage: result.usage,
                        metadata: result.metadata,
                    };
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::horde::client::HordeGeneration;

    #[test]
    fn test_shape_result_strips_leading_newlines() {
        let status = JobStatus {
            finished: true,
            kudos: 7.4,
            generations: vec![HordeGeneration {
                text: "\n\nHello\n".to_string(),
                model: Some("m".to_string()),
                worker_name: Some("w".to_string()),
                worker_id: Some("wid".to_string()),
            }],
            ..Default::default()
        };
        let result = shape_result("x1", &status).unwrap();
        assert_eq!(result.content, "Hello\n");
        assert_eq!(result.usage.total_tokens, 7);
        assert_eq!(result.metadata.request_id.as_deref(), Some("x1"));
        assert_eq!(result.metadata.worker.as_deref(), Some("w"));
        assert!(result.reasoning.is_none());
    }

    #[test]
    fn test_finished_without_generations_is_not_a_result() {
        let status = JobStatus {
            finished: true,
            ..Default::default()
        };
        assert!(shape_result("x1", &status).is_none());
    }
}
