use std::sync::Arc;

use crate::config::Config;
use crate::llm::ChatCompletion;
use crate::search::PassageSearch;
use crate::services::{SessionStore, Sommelier};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sommelier: Arc<Sommelier>,
    pub sessions: SessionStore,
    pub chat: Arc<dyn ChatCompletion>,
}

impl AppState {
    pub fn new(
        config: Config,
        search: Arc<dyn PassageSearch>,
        chat: Arc<dyn ChatCompletion>,
    ) -> Self {
        let config = Arc::new(config);
        let sommelier = Sommelier::new(search, chat.clone(), config.search.top_k, &config.chat);
        let sessions = SessionStore::new(&config.session);

        Self {
            config,
            sommelier: Arc::new(sommelier),
            sessions,
            chat,
        }
    }
}
