//! Prompt assembly for the generation service.
//!
//! The prompt is plain text in four blocks separated by blank lines:
//!
//! ```text
//! <preamble>
//!
//! <context segment, or empty>
//!
//! Conversation:
//! User: ...
//! Assistant: ...
//!
//! Answer:
//! ```

use crate::models::ConversationTurn;

/// Instruction line placed above the context segment.
pub const DEFAULT_PREAMBLE: &str =
    "Use the following information from the document to answer the user's question:";

/// Trailing cue the model completes.
pub const DEFAULT_CUE: &str = "Answer:";

/// Preamble and response cue used to frame a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub preamble: String,
    pub cue: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
            cue: DEFAULT_CUE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn render(&self, history: &[ConversationTurn], context: Option<&str>) -> String {
        let transcript = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n\n{}\n\nConversation:\n{}\n\n{}",
            self.preamble,
            context.unwrap_or(""),
            transcript,
            self.cue
        )
    }
}

/// Build a prompt from the full history and an optional context segment.
pub fn build_prompt(history: &[ConversationTurn], context: Option<&str>) -> String {
    PromptTemplate::default().render(history, context)
}

/// The most recent `max_turns` turns of `history`; `None` keeps everything.
pub fn history_window(
    history: &[ConversationTurn],
    max_turns: Option<usize>,
) -> &[ConversationTurn] {
    match max_turns {
        Some(max) if history.len() > max => &history[history.len() - max..],
        _ => history,
    }
}
