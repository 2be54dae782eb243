mod api;
pub mod prompts;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::PromptMessage;

pub use api::AzureChatClient;

/// A hosted chat-completion model.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Generates the next assistant message for `messages`, in order.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String>;

    /// Model or deployment identifier requests are sent to.
    fn model(&self) -> &str;
}
