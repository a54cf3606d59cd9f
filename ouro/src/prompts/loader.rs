//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;

/// Where a template was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOrigin {
    /// User override file
    File(PathBuf),
    /// Compiled into the binary
    Embedded,
}

impl std::fmt::Display for PromptOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Embedded => write!(f, "embedded"),
        }
    }
}

#[derive(Serialize)]
struct EvaluateContext<'a> {
    code: &'a str,
    prompts: &'a str,
}

#[derive(Serialize)]
struct FollowupContext<'a> {
    code: &'a str,
    prompts: &'a str,
    evaluation: &'a str,
}

#[derive(Serialize)]
struct ContinueContext<'a> {
    response: &'a str,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.ouro/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a new prompt loader rooted at `workdir`
    ///
    /// Overrides are read from `{workdir}/.ouro/prompts/{name}.pmt`.
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        let workdir = workdir.as_ref();
        debug!(?workdir, "PromptLoader::new: called");
        let user_dir = workdir.join(".ouro").join("prompts");

        if user_dir.is_dir() {
            debug!(?user_dir, "PromptLoader::new: user override directory found");
            Self::with_user_dir(Some(user_dir))
        } else {
            debug!(?user_dir, "PromptLoader::new: no user override directory");
            Self::with_user_dir(None)
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self::with_user_dir(None)
    }

    fn with_user_dir(user_dir: Option<PathBuf>) -> Self {
        let mut hbs = Handlebars::new();
        // prompts are plain text; code must reach the model verbatim
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs, user_dir }
    }

    /// Load a template's source by name
    ///
    /// Checks in order:
    /// 1. User override: `.ouro/prompts/{name}.pmt`
    /// 2. Embedded fallback
    ///
    /// The file's trailing line break is dropped.
    pub fn load_template(&self, name: &str) -> Result<(String, PromptOrigin)> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read user prompt {}", path.display()))?;
                return Ok((strip_trailing_newline(&content), PromptOrigin::File(path)));
            }
            debug!(?path, "PromptLoader::load_template: not found in user override");
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok((strip_trailing_newline(content), PromptOrigin::Embedded));
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let (template, origin) = self.load_template(template_name)?;
        info!("Rendering template '{}' from {}", template_name, origin);

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// The opening prompt of a run
    pub fn initial(&self) -> Result<String> {
        debug!("PromptLoader::initial: called");
        self.render("initial", &serde_json::json!({}))
    }

    /// Ask the model to judge an extracted code block and prompts
    pub fn evaluate(&self, code: &str, prompts: &str) -> Result<String> {
        self.render("evaluate", &EvaluateContext { code, prompts })
    }

    /// Next prompt after an evaluated code block
    pub fn followup(&self, code: &str, prompts: &str, evaluation: &str) -> Result<String> {
        self.render(
            "followup",
            &FollowupContext {
                code,
                prompts,
                evaluation,
            },
        )
    }

    /// Next prompt when the response had no code block
    pub fn continuation(&self, response: &str) -> Result<String> {
        self.render("continue", &ContinueContext { response })
    }
}

fn strip_trailing_newline(content: &str) -> String {
    content.strip_suffix('\n').map(|s| s.strip_suffix('\r').unwrap_or(s)).unwrap_or(content).to_string()
}
