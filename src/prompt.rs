//! Instruction text sent to the model and the message pair built from session state.

use regex::Regex;
use std::sync::OnceLock;

use crate::state::SessionState;

/// Fixed system instruction. The file name must match [`crate::artifact::ARTIFACT_FILE_NAME`].
pub const SYSTEM_PROMPT: &str = "\
You are an assistant that writes **only** executable Python code, with no extra text or commentary.
Use the `diagrams` package (https://diagrams.mingrammer.com/) to produce an
architecture diagram. The code **must** save the diagram to a file called
`architecture_diagram.png` in the working directory.

**Constraints**

1. Return only valid Python source code.
2. Do **not** wrap the code in markdown fences.
3. Pass `show=False` and `filename=\"architecture_diagram\"` to `Diagram` so the PNG is written without opening a viewer.
";

/// System instruction plus the single user message for one generate step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessages {
    pub system: String,
    pub user: String,
}

/// Build the message pair for the next generate step.
///
/// Without feedback the user message is the original description. With
/// feedback it is the latest generated code followed by the requested change.
pub fn build_messages(state: &SessionState) -> PromptMessages {
    let user = match (state.latest_code(), state.feedback.trim()) {
        (Some(code), feedback) if !feedback.is_empty() => build_revision_request(code, feedback),
        _ => state.user_input.clone(),
    };

    PromptMessages {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

fn build_revision_request(code: &str, feedback: &str) -> String {
    let mut prompt = String::with_capacity(code.len() + feedback.len() + 64);
    prompt.push_str(code.trim_end());
    prompt.push_str("\n\n# Requested change:\n");
    prompt.push_str(feedback);
    prompt
}

/// Pull executable source out of a model reply.
///
/// Models wrap code in markdown fences despite being told not to; the first
/// fenced block wins, otherwise the trimmed reply is returned as-is.
pub fn extract_code(reply: &str) -> String {
    match fenced_block().captures(reply) {
        Some(caps) => caps[1].trim_end().to_string(),
        None => reply.trim().to_string(),
    }
}

fn fenced_block() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ARTIFACT_FILE_NAME;

    #[test]
    fn test_first_message_is_description() {
        let state = SessionState::new("A web server behind a load balancer");
        let messages = build_messages(&state);
        assert_eq!(messages.system, SYSTEM_PROMPT);
        assert_eq!(messages.user, "A web server behind a load balancer");
    }

    #[test]
    fn test_feedback_is_merged_with_latest_code() {
        let mut state = SessionState::new("desc");
        state.push_code("print('v1')".to_string());
        state.push_code("print('v2')\n".to_string());
        state.feedback = "Add a Redis cache".to_string();

        let messages = build_messages(&state);
        assert!(messages.user.starts_with("print('v2')"));
        assert!(messages.user.ends_with("Add a Redis cache"));
        assert!(!messages.user.contains("v1"));
    }

    #[test]
    fn test_blank_feedback_falls_back_to_description() {
        let mut state = SessionState::new("desc");
        state.push_code("print('v1')".to_string());
        state.feedback = "   ".to_string();
        assert_eq!(build_messages(&state).user, "desc");
    }

    #[test]
    fn test_prompt_names_the_artifact() {
        assert!(SYSTEM_PROMPT.contains(ARTIFACT_FILE_NAME));
    }

    #[test]
    fn test_extract_code_strips_fences() {
        let reply = "Here you go:\n```python\nfrom diagrams import Diagram\nprint(1)\n```\nEnjoy";
        assert_eq!(extract_code(reply), "from diagrams import Diagram\nprint(1)");

        let bare = "```\nprint(2)\n```";
        assert_eq!(extract_code(bare), "print(2)");
    }

    #[test]
    fn test_extract_code_passes_plain_source_through() {
        assert_eq!(extract_code("\n  print(3)\n\n"), "print(3)");
    }
}
