use std::sync::Arc;

use crate::{
    config::ChatConfig,
    error::{BarneyError, Result},
    llm::{prompts::compose_messages, ChatCompletion},
    search::PassageSearch,
    services::SessionHistory,
};

/// Answers wine questions by grounding a chat completion on the best
/// matching passage from the search index.
pub struct Sommelier {
    search: Arc<dyn PassageSearch>,
    chat: Arc<dyn ChatCompletion>,
    top_k: usize,
    system_prompt: String,
    fallback_response: String,
}

impl Sommelier {
    pub fn new(
        search: Arc<dyn PassageSearch>,
        chat: Arc<dyn ChatCompletion>,
        top_k: usize,
        chat_config: &ChatConfig,
    ) -> Self {
        Self {
            search,
            chat,
            top_k: top_k.max(1),
            system_prompt: chat_config.system_prompt.clone(),
            fallback_response: chat_config.fallback_response.clone(),
        }
    }

    /// Runs one question through retrieval and generation.
    ///
    /// `history` is only touched after a successful answer, so a failed
    /// request leaves the session exactly as it was.
    pub async fn ask(&self, query: &str, history: &mut SessionHistory) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BarneyError::Validation("Query must not be empty".to_string()));
        }

        let context = match self.retrieve_context(query).await {
            Ok(context) => context,
            Err(BarneyError::RetrievalEmpty) => {
                tracing::info!(query_len = query.len(), "No passages found, sending fallback");
                history.update(query, Some(&self.fallback_response));
                return Ok(self.fallback_response.clone());
            }
            Err(error) => return Err(error),
        };

        let messages = compose_messages(&self.system_prompt, history.history(), query, &context);
        let answer = self.chat.complete(&messages).await?;

        history.update(query, Some(&answer));

        Ok(answer)
    }

    /// Content of the most relevant passage for `query`.
    async fn retrieve_context(&self, query: &str) -> Result<String> {
        let top = self
            .search
            .search(query, self.top_k)
            .await?
            .into_iter()
            .next()
            .ok_or(BarneyError::RetrievalEmpty)?;

        tracing::debug!(score = top.score, "Using top passage as context");
        Ok(top.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::Upstream;
    use crate::llm::prompts::{DEFAULT_FALLBACK_RESPONSE, DEFAULT_SYSTEM_PROMPT};
    use crate::models::{PromptMessage, RetrievedPassage, Role};

    struct FixedSearch {
        passages: Vec<RetrievedPassage>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl FixedSearch {
        fn new(passages: Vec<RetrievedPassage>) -> Arc<Self> {
            Arc::new(Self {
                passages,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PassageSearch for FixedSearch {
        async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>> {
            self.seen
                .lock()
                .expect("lock")
                .push((query.to_string(), top_k));
            Ok(self.passages.iter().take(top_k).cloned().collect())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl PassageSearch for FailingSearch {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<RetrievedPassage>> {
            Err(BarneyError::unavailable(Upstream::Search, "connection refused"))
        }
    }

    /// Answers with the content of the last message it was given.
    #[derive(Default)]
    struct EchoChat {
        calls: Mutex<Vec<Vec<PromptMessage>>>,
    }

    #[async_trait]
    impl ChatCompletion for EchoChat {
        async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
            self.calls.lock().expect("lock").push(messages.to_vec());
            Ok(messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default())
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct BrokenChat;

    #[async_trait]
    impl ChatCompletion for BrokenChat {
        async fn complete(&self, _messages: &[PromptMessage]) -> Result<String> {
            Err(BarneyError::contract(Upstream::Chat, "no choices"))
        }

        fn model(&self) -> &str {
            "broken"
        }
    }

    fn chat_config() -> ChatConfig {
        ChatConfig {
            endpoint: "https://barney.openai.azure.com".to_string(),
            api_key: "key".to_string(),
            api_version: "2024-02-01".to_string(),
            deployment: "wine-chat".to_string(),
            timeout_secs: 5,
            max_retries: 0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
        }
    }

    fn wines() -> Vec<RetrievedPassage> {
        vec![
            RetrievedPassage::new("Bold Napa Cabernet, 94pts", 0.91),
            RetrievedPassage::new("Light Pinot", 0.80),
        ]
    }

    #[tokio::test]
    async fn answer_is_grounded_on_top_passage() {
        let search = FixedSearch::new(wines());
        let chat = Arc::new(EchoChat::default());
        let sommelier = Sommelier::new(search.clone(), chat.clone(), 5, &chat_config());
        let mut history = SessionHistory::new(20);

        let answer = sommelier
            .ask("best Cabernet from Napa", &mut history)
            .await
            .expect("answer");

        assert_eq!(answer, "Bold Napa Cabernet, 94pts");
        assert_eq!(
            search.seen.lock().expect("lock").as_slice(),
            &[("best Cabernet from Napa".to_string(), 5)]
        );

        let calls = chat.calls.lock().expect("lock");
        let messages = &calls[0];
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], PromptMessage::user("best Cabernet from Napa"));
        assert_eq!(
            messages[2],
            PromptMessage::assistant("Bold Napa Cabernet, 94pts")
        );

        assert_eq!(history.len(), 2);
        assert_eq!(history.history()[1].content, "Bold Napa Cabernet, 94pts");
    }

    #[tokio::test]
    async fn prior_turns_are_sent_before_new_query() {
        let chat = Arc::new(EchoChat::default());
        let sommelier = Sommelier::new(FixedSearch::new(wines()), chat.clone(), 5, &chat_config());
        let mut history = SessionHistory::new(20);

        sommelier.ask("first", &mut history).await.expect("first");
        sommelier.ask("second", &mut history).await.expect("second");

        let calls = chat.calls.lock().expect("lock");
        let roles: Vec<Role> = calls[1].iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        assert_eq!(calls[1][1].content, "first");
        assert_eq!(calls[1][3].content, "second");
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn empty_retrieval_answers_with_fallback_without_calling_chat() {
        let chat = Arc::new(EchoChat::default());
        let sommelier = Sommelier::new(FixedSearch::new(vec![]), chat.clone(), 5, &chat_config());
        let mut history = SessionHistory::new(20);

        let answer = sommelier
            .ask("a wine from Mars", &mut history)
            .await
            .expect("fallback");

        assert_eq!(answer, DEFAULT_FALLBACK_RESPONSE);
        assert!(chat.calls.lock().expect("lock").is_empty());
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let sommelier = Sommelier::new(
            FixedSearch::new(wines()),
            Arc::new(EchoChat::default()),
            5,
            &chat_config(),
        );
        let mut history = SessionHistory::new(20);

        let result = sommelier.ask("   ", &mut history).await;

        assert!(matches!(result, Err(BarneyError::Validation(_))));
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn failures_leave_history_untouched() {
        let mut history = SessionHistory::new(20);
        history.update("earlier", Some("reply"));

        let search_down = Sommelier::new(
            Arc::new(FailingSearch),
            Arc::new(EchoChat::default()),
            5,
            &chat_config(),
        );
        let result = search_down.ask("anything", &mut history).await;
        assert!(matches!(
            result,
            Err(BarneyError::ServiceUnavailable {
                service: Upstream::Search,
                ..
            })
        ));
        assert_eq!(history.len(), 2);

        let chat_broken = Sommelier::new(
            FixedSearch::new(wines()),
            Arc::new(BrokenChat),
            5,
            &chat_config(),
        );
        let result = chat_broken.ask("anything", &mut history).await;
        assert!(matches!(
            result,
            Err(BarneyError::UpstreamContractViolation {
                service: Upstream::Chat,
                ..
            })
        ));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_sessions_do_not_share_history() {
        let sommelier = Arc::new(Sommelier::new(
            FixedSearch::new(wines()),
            Arc::new(EchoChat::default()),
            5,
            &chat_config(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let sommelier = Arc::clone(&sommelier);
                tokio::spawn(async move {
                    let mut history = SessionHistory::new(20);
                    sommelier
                        .ask(&format!("question {i}"), &mut history)
                        .await
                        .expect("answer");
                    history
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let history = task.await.expect("join");
            assert_eq!(history.len(), 2);
            assert_eq!(history.history()[0].content, format!("question {i}"));
        }
    }
}
