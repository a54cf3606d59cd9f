//! Ouro configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::extract::{CODE_FENCE, PROMPTS_MARKER};
use crate::stop::STOP_KEYWORDS;

/// Main Ouro configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Chat session behaviour
    pub chat: ChatConfig,

    /// Improvement loop settings
    pub improve: ImproveConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// 1. Explicit path (errors are fatal)
    /// 2. `./.ouro.yml`
    /// 3. `~/.config/ouro/ouro.yml`
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "Config::load: called");
        if let Some(path) = config_path {
            debug!("Config::load: explicit path given");
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::implicit_paths() {
            if !candidate.exists() {
                debug!(?candidate, "Config::load: candidate does not exist");
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Any failure is swallowed; the full load later reports it properly.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        match config_path {
            Some(path) => Self::load_from_file(path).ok().and_then(|c| c.log_level),
            None => Self::implicit_paths()
                .into_iter()
                .filter(|p| p.exists())
                .find_map(|p| Self::load_from_file(&p).ok())
                .and_then(|c| c.log_level),
        }
    }

    fn implicit_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".ouro.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ouro").join("ouro.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
///
/// `api-key-env` and `base-url` are optional; [`LlmConfig::resolve`] fills
/// them in from the provider's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "gemini", "anthropic" or "openai"
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// API base URL
    #[serde(rename = "base-url", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Optional system instruction sent with every request
    #[serde(rename = "system-prompt")]
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key_env: None,
            base_url: None,
            max_tokens: 8192,
            timeout_ms: 300_000,
            system_prompt: String::new(),
        }
    }
}

impl LlmConfig {
    /// Resolve provider defaults into a fully specified configuration
    pub fn resolve(&self) -> Result<ResolvedLlmConfig> {
        debug!(provider = %self.provider, model = %self.model, "LlmConfig::resolve: called");
        let (default_key_env, default_base_url) = match self.provider.as_str() {
            "gemini" => ("GOOGLE_API_KEY", "https://generativelanguage.googleapis.com"),
            "anthropic" => ("ANTHROPIC_API_KEY", "https://api.anthropic.com"),
            "openai" => ("OPENAI_API_KEY", "https://api.openai.com"),
            other => {
                debug!(provider = %other, "LlmConfig::resolve: unknown provider");
                return Err(eyre::eyre!(
                    "Unknown LLM provider: '{}'. Supported: gemini, anthropic, openai",
                    other
                ));
            }
        };

        Ok(ResolvedLlmConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key_env: self
                .api_key_env
                .clone()
                .unwrap_or_else(|| default_key_env.to_string()),
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url.to_string())
                .trim_end_matches('/')
                .to_string(),
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
        })
    }
}

/// LLM configuration with every provider default applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl ResolvedLlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        debug!(api_key_env = %self.api_key_env, "ResolvedLlmConfig::get_api_key: called");
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )),
        }
    }
}

/// Chat session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Send the whole conversation with every request
    pub history: bool,

    /// Upper bound on retained history messages (0 = unbounded)
    #[serde(rename = "max-history-messages")]
    pub max_history_messages: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history: true,
            max_history_messages: 0,
        }
    }
}

/// Improvement loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImproveConfig {
    /// Directory receiving the per-iteration code files
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,

    /// File name prefix, followed by the iteration number
    #[serde(rename = "file-prefix")]
    pub file_prefix: String,

    /// File extension, without the leading dot
    #[serde(rename = "file-extension")]
    pub file_extension: String,

    /// Opening fence that marks the code block
    #[serde(rename = "code-fence")]
    pub code_fence: String,

    /// Label preceding the updated prompts line
    #[serde(rename = "prompts-marker")]
    pub prompts_marker: String,

    /// Phrases in an evaluation that end the loop
    #[serde(rename = "stop-keywords")]
    pub stop_keywords: Vec<String>,

    /// Maximum iterations (0 = run until a stop keyword appears)
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,
}

impl Default for ImproveConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: "gemini_agent_updated_iter".to_string(),
            file_extension: "py".to_string(),
            code_fence: CODE_FENCE.to_string(),
            prompts_marker: PROMPTS_MARKER.to_string(),
            stop_keywords: STOP_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            max_iterations: 0,
        }
    }
}
