//! Storyloom - story prompt assembly and queued text generation

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use futures::StreamExt;
use storyloom_cli::commands::{Cli, Commands, ConfigCommands, PromptArgs};
use storyloom_cli::{input, settings};
use storyloom_config::{find_all_config_files, load_config_or_default, StoryloomConfig};
use storyloom_prompts::PromptAssembler;
use storyloom_protocol::{GenerationEvent, GenerationResult};
use storyloom_providers::{
    auto_select_models, CancelSignal, GenerationOptions, JobOrchestrator, ProviderError,
    ANONYMOUS_API_KEY,
};
use storyloom_telemetry::init_subscriber;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    init_subscriber(&settings::telemetry_config(&config.logging, cli.json_logs));

    let result = match &cli.command {
        Commands::Prompt { prompt } => run_prompt(&config, prompt),
        Commands::Generate {
            prompt,
            models,
            status,
            json,
        } => run_generate(&config, prompt, models, *status, *json).await,
        Commands::Models { auto, json } => run_models(&config, *auto, *json).await,
        Commands::Workers { model, json } => run_workers(&config, model.as_deref(), *json).await,
        Commands::Config { command } => run_config(command, &config),
    };

    if let Err(e) = result {
        exit_with(&e);
    }
}

fn exit_with(error: &anyhow::Error) -> ! {
    match error.downcast_ref::<ProviderError>() {
        Some(provider_error) => eprintln!(
            "{} [{}]: {}",
            "Error".red().bold(),
            provider_error.code(),
            provider_error.user_message()
        ),
        None => eprintln!("{}: {:#}", "Error".red().bold(), error),
    }
    std::process::exit(1);
}

fn run_prompt(config: &StoryloomConfig, args: &PromptArgs) -> Result<()> {
    let mut context = input::load_context(&args.context)?;
    input::apply_defaults(&mut context, config.generation.include_dialogue_examples);

    let assembler = PromptAssembler::new(config.prompts.clone());
    let params = input::request_params(args, &context);

    println!("{}", "System prompt:".cyan().bold());
    println!("{}", assembler.build_system_prompt(&context));
    println!("{}", "─".repeat(50).dimmed());
    println!("{}", "Generation prompt:".cyan().bold());
    println!("{}", assembler.build_request_prompt(&params));

    Ok(())
}

/// Cancel the job on Ctrl-C
fn cancel_on_ctrl_c() -> CancelSignal {
    let cancel = CancelSignal::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling generation");
            signal.cancel();
        }
    });
    cancel
}

async fn run_generate(
    config: &StoryloomConfig,
    args: &PromptArgs,
    models: &[String],
    print_status: bool,
    json_output: bool,
) -> Result<()> {
    let mut context = input::load_context(&args.context)?;
    input::apply_defaults(&mut context, config.generation.include_dialogue_examples);

    let orchestrator = JobOrchestrator::from_config(settings::horde_config(&config.horde))?;
    let mut options = settings::generation_options(&config.generation)
        .with_models(models.to_vec())
        .with_cancel(cancel_on_ctrl_c());

    // Size the budget once; the job reuses the resolved models and context length
    let prepared = orchestrator.prepare(&options).await;
    options.models = prepared.models.clone();
    options.max_context_length = Some(prepared.budget.context_tokens);

    let mut params = input::request_params(args, &context);
    if params.max_chars.is_none() {
        params.max_chars = Some(prepared.budget.max_chars);
    }

    let assembler = PromptAssembler::new(config.prompts.clone());
    let system_prompt = assembler.build_system_prompt(&context);
    let user_prompt = assembler.build_request_prompt(&params);

    if !json_output {
        let target = if prepared.models.is_empty() {
            "any model".to_string()
        } else {
            prepared.models.join(", ")
        };
        eprintln!(
            "{} {} (context {} tokens, {} chars)",
            "Submitting:".cyan().bold(),
            target.yellow(),
            prepared.budget.context_tokens,
            prepared.budget.max_chars
        );
    }

    let result = if print_status {
        run_with_status(&orchestrator, system_prompt, user_prompt, options).await?
    } else {
        orchestrator
            .generate(&system_prompt, &user_prompt, &options)
            .await?
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(())
}

async fn run_with_status(
    orchestrator: &JobOrchestrator,
    system_prompt: String,
    user_prompt: String,
    options: GenerationOptions,
) -> Result<GenerationResult> {
    let mut stream = orchestrator.generate_with_status(system_prompt, user_prompt, options);

    while let Some(event) = stream.next().await {
        match event? {
            GenerationEvent::Status {
                queue_position,
                wait_time,
                finished,
                faulted,
            } => {
                let state = if faulted {
                    "faulted".red()
                } else if finished {
                    "finished".green()
                } else {
                    "waiting".yellow()
                };
                eprintln!(
                    "{} {} queue position {}, wait {}s",
                    "Status:".cyan(),
                    state,
                    queue_position,
                    wait_time
                );
            }
            GenerationEvent::Delta { text } => eprint!("{}", text.dimmed()),
            GenerationEvent::Complete {
                content,
                usage,
                metadata,
            } => {
                return Ok(GenerationResult {
                    content,
                    reasoning: None,
                    usage,
                    metadata,
                });
            }
        }
    }

    Err(ProviderError::InvalidResponse("status stream ended without a result".to_string()).into())
}

fn print_result(result: &GenerationResult) {
    println!("{}", result.content);

    let metadata = &result.metadata;
    let mut details = Vec::new();
    if let Some(model) = &metadata.model {
        details.push(format!("model {}", model));
    }
    if let Some(worker) = &metadata.worker {
        details.push(format!("worker {}", worker));
    }
    if result.usage.total_tokens > 0 {
        details.push(format!("{} kudos", result.usage.total_tokens));
    }
    if !details.is_empty() {
        eprintln!("{}", details.join(", ").dimmed());
    }
}

async fn run_models(config: &StoryloomConfig, auto: bool, json_output: bool) -> Result<()> {
    let horde = settings::horde_config(&config.horde);
    let selector = horde.model_selector.clone();
    let orchestrator = JobOrchestrator::from_config(horde)?;
    let models = orchestrator.list_models().await?;

    let models = if auto {
        let selected = auto_select_models(&models, &selector);
        models
            .into_iter()
            .filter(|model| selected.contains(&model.name))
            .collect()
    } else {
        models
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!("{}", "No models available.".dimmed());
        return Ok(());
    }

    println!("{}", "Text models:".cyan().bold());
    println!("{}", "─".repeat(80).dimmed());
    for model in &models {
        println!(
            "  {:<50} {:>3} workers  queue {:>6.0}  eta {:>4}s",
            model.name.yellow(),
            model.worker_count,
            model.queue_depth,
            model.eta
        );
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

async fn run_workers(config: &StoryloomConfig, model: Option<&str>, json_output: bool) -> Result<()> {
    let orchestrator = JobOrchestrator::from_config(settings::horde_config(&config.horde))?;
    let workers: Vec<_> = orchestrator
        .list_workers()
        .await?
        .into_iter()
        .filter(|worker| model.map_or(true, |m| worker.supported_models.iter().any(|s| s == m)))
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&workers)?);
        return Ok(());
    }

    if workers.is_empty() {
        println!("{}", "No workers online.".dimmed());
        return Ok(());
    }

    println!("{}", "Online workers:".cyan().bold());
    println!("{}", "─".repeat(80).dimmed());
    for worker in &workers {
        let trust = if worker.trusted {
            "trusted".green()
        } else {
            "untrusted".dimmed()
        };
        println!(
            "  {:<40} ctx {:>6}  max {:>5}  {}",
            worker.name.yellow(),
            worker.max_context_length,
            worker.max_generation_length,
            trust
        );
        println!("    {}", worker.supported_models.join(", ").dimmed());
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

fn run_config(command: &ConfigCommands, config: &StoryloomConfig) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let mut shown = config.clone();
            if shown.horde.api_key != ANONYMOUS_API_KEY {
                shown.horde.api_key = "********".to_string();
            }
            println!("{}", "Current configuration:".cyan().bold());
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigCommands::Path => {
            let files = find_all_config_files();
            if files.is_empty() {
                println!("{}", "No config files found; using defaults.".dimmed());
            }
            for (index, path) in files.iter().enumerate() {
                let marker = if index == 0 { "active".green() } else { "shadowed".dimmed() };
                println!("  {} ({})", path.display(), marker);
            }
        }
    }
    Ok(())
}
