//! Token to character context budgeting

use super::catalog::{min_context_length, WorkerDescriptor};
use serde::Serialize;

const CHARS_PER_CONTEXT_TOKEN: f64 = 3.0;
const CHARS_PER_GENERATED_TOKEN: f64 = 3.5;
const PROTOCOL_OVERHEAD_CHARS: f64 = 100.0;
pub const MIN_BUDGET_CHARS: usize = 1000;

/// Context window available to one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextBudget {
    /// Context length sent with the job, in tokens
    pub context_tokens: u32,
    /// Characters of prompt the window leaves room for
    pub max_chars: usize,
}

impl ContextBudget {
    /// Reserve room for the generated tokens plus protocol overhead
    pub fn from_tokens(context_tokens: u32, max_tokens: u32) -> Self {
        let available = f64::from(context_tokens) * CHARS_PER_CONTEXT_TOKEN
            - f64::from(max_tokens) * CHARS_PER_GENERATED_TOKEN
            - PROTOCOL_OVERHEAD_CHARS;
        let max_chars = if available.is_finite() && available > MIN_BUDGET_CHARS as f64 {
            available.floor() as usize
        } else {
            MIN_BUDGET_CHARS
        };

        Self {
            context_tokens,
            max_chars,
        }
    }

    /// Size the budget from the tightest worker serving `models`
    pub fn from_workers(
        workers: &[WorkerDescriptor],
        models: &[String],
        default_context_length: u32,
        max_tokens: u32,
    ) -> Self {
        let context_tokens =
            min_context_length(workers, models).unwrap_or(default_context_length);
        Self::from_tokens(context_tokens, max_tokens)
    }
}
