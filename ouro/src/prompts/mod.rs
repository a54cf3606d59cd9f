//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for the improvement loop.
//!
//! Template loading chain:
//! 1. `.ouro/prompts/{name}.pmt` (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution, with HTML
//! escaping turned off.

pub mod embedded;
mod loader;

pub use loader::{PromptLoader, PromptOrigin};
