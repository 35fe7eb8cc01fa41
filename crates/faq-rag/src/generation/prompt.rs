//! Prompt templates for FAQ generation and prompt screening

use super::responder::NO_INFORMATION;

/// Prompt builder for FAQ queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Concatenate the system instruction, retrieved context and utterance
    pub fn assemble(system_instruction: &str, context: &str, utterance: &str) -> String {
        format!(
            r#"{system_instruction}

CONTEXT:
{context}

QUESTION: {utterance}

ANSWER:"#,
            system_instruction = system_instruction.trim(),
            context = context.trim(),
            utterance = utterance.trim(),
        )
    }

    /// Prompt used when retrieval found nothing but the model is asked anyway
    pub fn build_no_context_prompt(system_instruction: &str, utterance: &str) -> String {
        format!(
            r#"{system_instruction}

No FAQ entry matched this question. If you cannot answer it reliably, reply exactly with "{fallback}"

QUESTION: {utterance}

ANSWER:"#,
            system_instruction = system_instruction.trim(),
            fallback = NO_INFORMATION,
            utterance = utterance.trim(),
        )
    }

    /// Classification prompt for SAFE/UNSAFE screening of user input
    pub fn build_screening_prompt(utterance: &str) -> String {
        format!(
            r#"You are a content safety classifier for a public FAQ assistant. Respond only with 'SAFE' or 'UNSAFE'. No explanation needed.
Mark prompts containing hate speech, violence, illegal activities, harmful content, misleading information, or policy violations as 'UNSAFE'.
Ordinary questions about the organisation's services should be 'SAFE'.

Prompt: {utterance}
Classification:"#,
            utterance = utterance,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_contains_all_parts() {
        let context = "Question: When was Aurora Bay founded? Answer: Aurora Bay was founded in 1901...";
        let prompt = PromptBuilder::assemble("Be helpful.", context, "When was Aurora Bay founded?");

        assert!(prompt.starts_with("Be helpful."));
        assert!(prompt.contains(context));
        assert!(prompt.contains("QUESTION: When was Aurora Bay founded?"));
        assert!(prompt.find("CONTEXT:").unwrap() < prompt.find("QUESTION:").unwrap());
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let a = PromptBuilder::assemble("sys", "ctx", "U");
        let b = PromptBuilder::assemble("sys", "ctx", "U");
        assert_eq!(a, b);
    }

    #[test]
    fn test_assemble_with_empty_context() {
        let prompt = PromptBuilder::assemble("sys", "", "U");
        assert!(prompt.contains("CONTEXT:\n\n"));
    }

    #[test]
    fn test_no_context_prompt_names_fallback() {
        let prompt = PromptBuilder::build_no_context_prompt("sys", "Who is the mayor?");
        assert!(prompt.contains("Sorry, I don't have that information."));
        assert!(prompt.contains("Who is the mayor?"));
    }
}
