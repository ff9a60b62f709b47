//! Prompts sent to the text-generation capability.
//!
//! Each call carries exactly one part's text after a fixed instruction line.
//! The placeholders stand in for a part whose response was empty or that
//! failed under [`crate::config::CapabilityFailurePolicy::Placeholder`].

/// Instruction line for plain summaries.
pub const SUMMARY_INSTRUCTION: &str = "Summarize this document:";

/// Instruction line for keyword extraction.
pub const KEYWORDS_INSTRUCTION: &str = "Extract keywords from this document:";

/// Body used when a summary is unavailable.
pub const SUMMARY_PLACEHOLDER: &str = "No summary available.";

/// Body used when no keywords came back.
pub const KEYWORDS_PLACEHOLDER: &str = "No keywords found.";

/// `"{instruction}\n{text}"`.
pub fn build_prompt(instruction: &str, text: &str) -> String {
    format!("{instruction}\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_layout() {
        assert_eq!(
            build_prompt(SUMMARY_INSTRUCTION, "body text"),
            "Summarize this document:\nbody text"
        );
        assert_eq!(
            build_prompt(KEYWORDS_INSTRUCTION, ""),
            "Extract keywords from this document:\n"
        );
    }
}
