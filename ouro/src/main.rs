//! Ouro - self-improvement loop driver
//!
//! CLI entry point.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use ouro::chat::ChatSession;
use ouro::cli::{Cli, Command, RunArgs, generate_after_help};
use ouro::config::Config;
use ouro::llm::{LlmError, create_client};
use ouro::prompts::{PromptLoader, embedded};
use ouro::r#loop::{IterationReport, LoopEngine, RunOutcome};

/// Longest evaluation excerpt printed to the terminal
const EVALUATION_PREVIEW_CHARS: usize = 400;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = ouro::cli::get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Ouro loaded config: provider={} model={}",
        config.llm.provider, config.llm.model
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run(args)) => cmd_run(config, args).await,
        Some(Command::Prompts { name }) => cmd_prompts(name.as_deref()),
        Some(Command::Config) => cmd_config(&config),
        None => {
            debug!("main: no command specified, running loop with defaults");
            cmd_run(config, RunArgs::default()).await
        }
    }
}

/// Run the improvement loop
async fn cmd_run(mut config: Config, args: RunArgs) -> Result<()> {
    debug!(?args, "cmd_run: called");
    if let Some(max) = args.max_iterations {
        config.improve.max_iterations = max;
    }
    if let Some(ref dir) = args.output_dir {
        config.improve.output_dir = dir.clone();
    }

    // Validate API key early by resolving the config
    let resolved = config.llm.resolve().context("Invalid LLM configuration")?;
    resolved.get_api_key()?;

    let workdir = std::env::current_dir()?;
    let prompts = PromptLoader::new(&workdir);
    let initial_prompt = match args.initial_prompt()? {
        Some(prompt) => prompt,
        None => prompts.initial()?,
    };

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let chat = ChatSession::from_config(llm, config.llm.max_tokens, &config.chat)
        .with_system_prompt(config.llm.system_prompt.clone());

    println!("{} {} ({})", "Running".bold(), config.llm.model, config.llm.provider);
    println!("  Output dir: {}", config.improve.output_dir.display());
    match config.improve.max_iterations {
        0 => println!("  Max iterations: until a stop keyword appears"),
        n => println!("  Max iterations: {}", n),
    }
    println!();

    let mut engine = LoopEngine::new(&config.improve, chat, prompts, initial_prompt).with_observer(print_report);

    let result = engine.run().await;
    let usage = engine.chat().usage();
    println!(
        "\nRound trips: {}, tokens in/out: {}/{}",
        engine.chat().round_trips(),
        usage.input_tokens,
        usage.output_tokens
    );

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(wait) = rate_limit_wait(&e) {
                eprintln!(
                    "{} the provider asked to wait {}s before retrying",
                    "Rate limited:".red().bold(),
                    wait.as_secs()
                );
            }
            return Err(e);
        }
    };

    match outcome {
        RunOutcome::Improved { iterations, keyword } => {
            println!(
                "{} after {} iterations (evaluation mentioned '{}')",
                "✓ Significant improvements achieved".green(),
                iterations,
                keyword
            );
        }
        RunOutcome::MaxIterations { iterations } => {
            println!(
                "{} after {} iterations without a stop keyword",
                "⚠ Stopped".yellow(),
                iterations
            );
        }
    }

    Ok(())
}

/// Wait time from a rate-limit error anywhere in the chain
fn rate_limit_wait(err: &eyre::Report) -> Option<Duration> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<LlmError>())
        .and_then(LlmError::retry_after)
}

fn print_report(report: &IterationReport) {
    println!("{}", format!("Iteration {}", report.iteration).cyan().bold());
    match report.artifact {
        Some(ref path) => println!("  Saved code to {}", path.display()),
        None => println!("  No code block in response ({} chars)", report.response_len),
    }
    if !report.prompts.is_empty() {
        println!("  Updated prompts: {}", report.prompts);
    }
    if let Some(ref evaluation) = report.evaluation {
        println!("  Evaluation: {}", preview(evaluation, EVALUATION_PREVIEW_CHARS));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

/// List templates or print one
fn cmd_prompts(name: Option<&str>) -> Result<()> {
    debug!(?name, "cmd_prompts: called");
    let loader = PromptLoader::new(std::env::current_dir()?);

    match name {
        Some(name) => {
            let (template, origin) = loader.load_template(name)?;
            println!("{} {}", "#".dimmed(), origin.to_string().dimmed());
            println!("{}", template);
        }
        None => {
            println!("Prompt templates:");
            for name in embedded::NAMES {
                let (_, origin) = loader.load_template(name)?;
                println!("  {:<10} {}", name, origin);
            }
        }
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
