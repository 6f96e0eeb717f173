//! Storyloom Protocol - Shared types for prompt assembly and generation
//!
//! This crate defines the data model passed between the Storyloom crates:
//! - Story state (personas, character cards, lorebook entries)
//! - Generation requests and their built-in instruction types
//! - Generation results and the events emitted while a job runs

mod generation;
mod story;

pub use generation::*;
pub use story::*;
