//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Opening instructions for the first iteration
pub const INITIAL: &str = include_str!("../../prompts/initial.pmt");

/// Request to evaluate an extracted code block and prompts
pub const EVALUATE: &str = include_str!("../../prompts/evaluate.pmt");

/// Next prompt after a code block was found and evaluated
pub const FOLLOWUP: &str = include_str!("../../prompts/followup.pmt");

/// Next prompt when the response carried no code block
pub const CONTINUE: &str = include_str!("../../prompts/continue.pmt");

/// Names of every embedded template, in the order they are used
pub const NAMES: [&str; 4] = ["initial", "evaluate", "followup", "continue"];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "initial" => Some(INITIAL),
        "evaluate" => Some(EVALUATE),
        "followup" => Some(FOLLOWUP),
        "continue" => Some(CONTINUE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_initial() {
        let initial = get_embedded("initial").unwrap();
        assert!(initial.contains("self-improving AI agent"));
        assert!(initial.contains("significant improvements"));
    }

    #[test]
    fn test_embedded_templates_reference_their_variables() {
        assert!(EVALUATE.contains("{{code}}") && EVALUATE.contains("{{prompts}}"));
        assert!(FOLLOWUP.contains("{{evaluation}}"));
        assert!(CONTINUE.contains("{{response}}"));
    }

    #[test]
    fn test_every_name_resolves() {
        for name in NAMES {
            assert!(get_embedded(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
