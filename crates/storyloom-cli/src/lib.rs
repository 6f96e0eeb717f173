//! Storyloom CLI - Command-line interface
//!
//! This crate provides the `storyloom` binary:
//! - `prompt`: print the assembled system and generation prompts
//! - `generate`: run a queued generation for a story
//! - `models` / `workers`: inspect the live catalogs
//! - `config`: show the effective configuration

pub mod commands;
pub mod input;
pub mod settings;

pub use commands::{Cli, Commands, ConfigCommands, PromptArgs};
