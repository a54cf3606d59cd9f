//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use eyre::Context;
use std::path::PathBuf;
use tracing::debug;

/// Ouro - self-improvement loop driver
#[derive(Parser)]
#[command(
    name = "ouro",
    about = "Iteratively asks a model to improve its own code until it reports a significant improvement",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the improvement loop
    Run(RunArgs),

    /// List prompt templates, or print one
    Prompts {
        /// Template name (initial, evaluate, followup, continue)
        name: Option<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Options for `ouro run`
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Initial prompt text (replaces the built-in initial prompt)
    #[arg(short, long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Read the initial prompt from a file
    #[arg(short = 'f', long = "prompt-file")]
    pub prompt_file: Option<PathBuf>,

    /// Maximum iterations (0 = until a stop keyword appears)
    #[arg(short, long)]
    pub max_iterations: Option<u32>,

    /// Directory for the per-iteration code files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

impl RunArgs {
    /// Resolve the initial prompt override, if any
    pub fn initial_prompt(&self) -> eyre::Result<Option<String>> {
        debug!(?self.prompt_file, has_prompt = self.prompt.is_some(), "RunArgs::initial_prompt: called");
        if let Some(ref prompt) = self.prompt {
            return Ok(Some(prompt.clone()));
        }
        match self.prompt_file {
            Some(ref path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ouro")
        .join("logs")
        .join("ouro.log")
}

/// Generate the after_help text
pub fn generate_after_help() -> String {
    format!("Logs are written to: {}\n", get_log_path().display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["ouro"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["ouro", "run", "-m", "5", "-o", "out", "--prompt", "hello"]);
        if let Some(Command::Run(args)) = cli.command {
            assert_eq!(args.max_iterations, Some(5));
            assert_eq!(args.output_dir, Some(PathBuf::from("out")));
            assert_eq!(args.prompt.as_deref(), Some("hello"));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_prompt_conflicts_with_prompt_file() {
        let result = Cli::try_parse_from(["ouro", "run", "--prompt", "a", "--prompt-file", "b.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_prompts() {
        let cli = Cli::parse_from(["ouro", "prompts", "evaluate"]);
        assert!(matches!(cli.command, Some(Command::Prompts { name: Some(ref n) }) if n == "evaluate"));
    }

    #[test]
    fn test_cli_with_config_and_log_level() {
        let cli = Cli::parse_from(["ouro", "-c", "/path/to/ouro.yml", "-l", "debug", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/ouro.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Some(Command::Config)));
    }

    #[test]
    fn test_initial_prompt_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "from file").unwrap();

        let args = RunArgs {
            prompt_file: Some(path),
            ..Default::default()
        };
        assert_eq!(args.initial_prompt().unwrap().as_deref(), Some("from file"));
        assert!(RunArgs::default().initial_prompt().unwrap().is_none());
    }

    #[test]
    fn test_initial_prompt_missing_file() {
        let args = RunArgs {
            prompt_file: Some(PathBuf::from("/nonexistent/prompt.txt")),
            ..Default::default()
        };
        let err = args.initial_prompt().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/prompt.txt"));
        assert!(err.chain().any(|cause| cause.downcast_ref::<std::io::Error>().is_some()));
    }
}
