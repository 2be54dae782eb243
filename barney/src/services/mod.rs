mod history;
mod sessions;
mod sommelier;

pub use history::SessionHistory;
pub use sessions::{Session, SessionHandle, SessionStore};
pub use sommelier::Sommelier;
