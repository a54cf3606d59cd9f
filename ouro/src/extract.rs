//! Response extraction
//!
//! Pure helpers that pull the code block and the updated prompts line out of
//! a model response. Every helper returns an empty string when a marker it
//! needs is absent, and always uses the first occurrence of the opening marker.

use tracing::debug;

/// Opening fence of the code block the loop looks for
pub const CODE_FENCE: &str = "```python";

/// Fence that closes any code block
pub const CLOSING_FENCE: &str = "```";

/// Label preceding the updated prompts on the same line
pub const PROMPTS_MARKER: &str = "Updated Prompts:";

/// Check whether a response carries a code block opened by `fence`
pub fn contains_code_block(response: &str, fence: &str) -> bool {
    let found = response.contains(fence);
    debug!(response_len = response.len(), %fence, found, "contains_code_block: called");
    found
}

/// Extract the body of the first code block opened by `fence`
///
/// The body runs from the end of the opening fence to the next closing fence
/// and is trimmed. Returns an empty string when the opening fence is missing or
/// the block is never closed.
pub fn extract_code_block(response: &str, fence: &str) -> String {
    debug!(response_len = response.len(), %fence, "extract_code_block: called");
    let Some(start) = response.find(fence) else {
        debug!("extract_code_block: no opening fence");
        return String::new();
    };

    let body_start = start + fence.len();
    match response[body_start..].find(CLOSING_FENCE) {
        Some(offset) => {
            let code = response[body_start..body_start + offset].trim().to_string();
            debug!(code_len = code.len(), "extract_code_block: extracted");
            code
        }
        None => {
            debug!("extract_code_block: no closing fence");
            String::new()
        }
    }
}

/// Extract the text following `marker` up to the end of its line
///
/// Returns an empty string when the marker is missing or sits on the final
/// line with no line break after it.
pub fn extract_prompts(response: &str, marker: &str) -> String {
    debug!(response_len = response.len(), %marker, "extract_prompts: called");
    let Some(start) = response.find(marker) else {
        debug!("extract_prompts: no marker");
        return String::new();
    };

    let Some(line_end) = response[start..].find('\n').map(|offset| start + offset) else {
        debug!("extract_prompts: marker on unterminated final line");
        return String::new();
    };

    let text_start = (start + marker.len()).min(line_end);
    let prompts = response[text_start..line_end].trim().to_string();
    debug!(prompts_len = prompts.len(), "extract_prompts: extracted");
    prompts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RESPONSE: &str = "Here is my improved agent.\n\n```python\ndef run():\n    return 42\n```\n\nUpdated Prompts: Be more concise.\nMore text after.";

    #[test]
    fn test_contains_code_block() {
        assert!(contains_code_block(RESPONSE, CODE_FENCE));
        assert!(!contains_code_block("```rust\nfn main() {}\n```", CODE_FENCE));
    }

    #[test]
    fn test_extract_code_block() {
        assert_eq!(extract_code_block(RESPONSE, CODE_FENCE), "def run():\n    return 42");
    }

    #[test]
    fn test_extract_code_block_uses_first_block() {
        let response = "```python\nfirst\n```\n```python\nsecond\n```";
        assert_eq!(extract_code_block(response, CODE_FENCE), "first");
    }

    #[test]
    fn test_extract_code_block_missing_fence() {
        assert_eq!(extract_code_block("no code here", CODE_FENCE), "");
    }

    #[test]
    fn test_extract_code_block_unclosed() {
        assert_eq!(extract_code_block("```python\nprint('hi')\n", CODE_FENCE), "");
    }

    #[test]
    fn test_extract_code_block_empty_body() {
        assert_eq!(extract_code_block("```python```", CODE_FENCE), "");
    }

    #[test]
    fn test_extract_code_block_custom_fence() {
        let response = "```rust\nfn main() {}\n```";
        assert_eq!(extract_code_block(response, "```rust"), "fn main() {}");
    }

    #[test]
    fn test_extract_prompts() {
        assert_eq!(extract_prompts(RESPONSE, PROMPTS_MARKER), "Be more concise.");
    }

    #[test]
    fn test_extract_prompts_missing_marker() {
        assert_eq!(extract_prompts("nothing to see", PROMPTS_MARKER), "");
    }

    #[test]
    fn test_extract_prompts_final_line_without_newline() {
        assert_eq!(extract_prompts("text\nUpdated Prompts: last line", PROMPTS_MARKER), "");
    }

    #[test]
    fn test_extract_prompts_empty_line() {
        assert_eq!(extract_prompts("Updated Prompts:\nnext", PROMPTS_MARKER), "");
    }

    #[test]
    fn test_extract_prompts_first_occurrence() {
        let response = "Updated Prompts: one\nUpdated Prompts: two\n";
        assert_eq!(extract_prompts(response, PROMPTS_MARKER), "one");
    }

    #[test]
    fn test_extract_handles_multibyte_text() {
        let response = "héllo ```python\nprint('ünïcode ✓')\n``` Updated Prompts: ✓ ok\n";
        assert_eq!(extract_code_block(response, CODE_FENCE), "print('ünïcode ✓')");
        assert_eq!(extract_prompts(response, PROMPTS_MARKER), "✓ ok");
    }

    proptest! {
        #[test]
        fn prop_extractors_never_panic(s in "\\PC*") {
            let _ = extract_code_block(&s, CODE_FENCE);
            let _ = extract_prompts(&s, PROMPTS_MARKER);
        }

        #[test]
        fn prop_code_block_recovered(body in "[a-zA-Z0-9 =()\n]{0,64}") {
            let response = format!("intro\n```python\n{}\n```\noutro", body);
            prop_assert_eq!(extract_code_block(&response, CODE_FENCE), body.trim());
        }
    }
}
