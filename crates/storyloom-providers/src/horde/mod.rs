//! Queue-based back-end for the AI Horde text API

mod budget;
mod catalog;
mod client;
mod job;
mod orchestrator;

pub use budget::{ContextBudget, MIN_BUDGET_CHARS};
pub use catalog::{
    auto_select_models, min_context_length, ModelDescriptor, WorkerDescriptor,
    DEFAULT_WORKER_CONTEXT_LENGTH, DEFAULT_WORKER_GENERATION_LENGTH,
};
pub use client::{HordeClient, HordeGeneration, JobStatus, SubmitParams, SubmitPayload};
pub use job::{Job, JobState};
pub use orchestrator::{GenerationStream, JobOrchestrator, PreparedJob};
