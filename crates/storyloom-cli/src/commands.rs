//! CLI commands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Storyloom - story prompt assembly and queued text generation
#[derive(Parser, Debug)]
#[command(name = "storyloom")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: storyloom.{jsonc,json,yml,yaml} or ~/.config/storyloom/)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the system prompt and generation prompt for a story
    Prompt {
        #[command(flatten)]
        prompt: PromptArgs,
    },

    /// Build the prompts and run a generation job
    Generate {
        #[command(flatten)]
        prompt: PromptArgs,

        /// Model to request (repeatable); overrides configured models
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Print queue status after every poll
        #[arg(long)]
        status: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List text models currently served
    Models {
        /// Show only the models auto-selection would pick
        #[arg(long)]
        auto: bool,

        #[arg(long)]
        json: bool,
    },

    /// List online text workers
    Workers {
        /// Only workers serving this model
        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Story input shared by `prompt` and `generate`
#[derive(Args, Debug, Clone)]
pub struct PromptArgs {
    /// Story context file (JSON or YAML)
    pub context: PathBuf,

    /// Generation type: continue, character or custom
    #[arg(short = 't', long = "type", default_value = "continue")]
    pub generation_type: String,

    /// Focal character for `character` generations (default: first card)
    #[arg(long)]
    pub character: Option<String>,

    /// Instruction for `custom` generations
    #[arg(short, long)]
    pub instruction: Option<String>,

    /// Template replacing the built-in instruction
    #[arg(long)]
    pub template: Option<String>,

    /// Trailing story characters to keep
    #[arg(long)]
    pub max_chars: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// List config files that were found
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::parse_from([
            "storyloom",
            "generate",
            "story.json",
            "--type",
            "character",
            "--character",
            "Aria",
            "-m",
            "a",
            "-m",
            "b",
            "--status",
        ]);
        match cli.command {
            Commands::Generate {
                prompt,
                models,
                status,
                json,
            } => {
                assert_eq!(prompt.context, PathBuf::from("story.json"));
                assert_eq!(prompt.generation_type, "character");
                assert_eq!(prompt.character.as_deref(), Some("Aria"));
                assert_eq!(models, vec!["a", "b"]);
                assert!(status);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["storyloom", "models", "--auto", "-c", "my.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("my.yaml")));
        assert!(matches!(cli.command, Commands::Models { auto: true, .. }));
    }
}
