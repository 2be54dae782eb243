mod chat;
mod search;

pub use chat::{ChatTurn, PromptMessage, Role};
pub use search::RetrievedPassage;
