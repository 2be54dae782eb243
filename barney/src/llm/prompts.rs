//! Prompt text and message-list assembly for the sommelier.

use crate::models::{ChatTurn, PromptMessage};

/// System instruction placed at the head of every prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Assistant is called Barney and is a chatbot that helps you find the best wine for your taste.";

/// Answer given when the index has nothing relevant to say.
pub const DEFAULT_FALLBACK_RESPONSE: &str = "I couldn't find any wines matching that request. \
Could you try describing it differently, for example by grape, region or price?";

/// Builds the message list for one completion request.
///
/// Order is fixed: one system message, the prior turns in chronological
/// order, the current user query, then the retrieved passage as an assistant
/// message. The passage is always last.
///
/// # Example
/// ```
/// use barney::llm::prompts::compose_messages;
/// use barney::models::Role;
///
/// let messages = compose_messages("Be helpful.", &[], "A bold red?", "Napa Cabernet, 94pts");
/// assert_eq!(messages.len(), 3);
/// assert_eq!(messages[0].role, Role::System);
/// assert_eq!(messages[2].content, "Napa Cabernet, 94pts");
/// ```
pub fn compose_messages(
    system_prompt: &str,
    history: &[ChatTurn],
    query: &str,
    context: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(PromptMessage::system(system_prompt));
    messages.extend(history.iter().map(PromptMessage::from));
    messages.push(PromptMessage::user(query));
    messages.push(PromptMessage::assistant(context));
    messages
}
