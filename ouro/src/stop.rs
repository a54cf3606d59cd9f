//! Stop condition for the improvement loop

use tracing::debug;

/// Phrases in an evaluation that signal the loop has converged
pub const STOP_KEYWORDS: [&str; 3] = ["significant improvement", "major enhancement", "substantial optimization"];

/// Case-insensitive check for any keyword inside `evaluation`
pub fn is_significant<S: AsRef<str>>(evaluation: &str, keywords: &[S]) -> bool {
    StopCondition::new(keywords).matches(evaluation).is_some()
}

/// Keyword set deciding when an evaluation ends the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCondition {
    keywords: Vec<String>,
}

impl StopCondition {
    /// Build a condition from keywords; empty entries are dropped
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        debug!(?keywords, "StopCondition::new: called");
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Return the first keyword contained in `evaluation`, if any
    pub fn matches(&self, evaluation: &str) -> Option<&str> {
        let lowered = evaluation.to_lowercase();
        let matched = self.keywords.iter().find(|k| lowered.contains(k.as_str()));
        debug!(evaluation_len = evaluation.len(), ?matched, "StopCondition::matches: called");
        matched.map(String::as_str)
    }
}

impl Default for StopCondition {
    fn default() -> Self {
        Self::new(&STOP_KEYWORDS)
    }
}
