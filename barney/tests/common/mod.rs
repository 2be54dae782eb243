#![allow(dead_code)]

use barney::config::{
    ChatConfig, Config, EmbeddingsConfig, SearchConfig, ServerConfig, SessionConfig,
};
use barney::llm::prompts::{DEFAULT_FALLBACK_RESPONSE, DEFAULT_SYSTEM_PROMPT};
use serde_json::json;

pub const DIMENSIONS: usize = 8;
pub const SEARCH_KEY: &str = "search-test-key";
pub const OPENAI_KEY: &str = "openai-test-key";
pub const AZURE_KEY: &str = "azure-test-key";
pub const INDEX: &str = "wine-reviews";
pub const DEPLOYMENT: &str = "wine-chat";
pub const CHAT_API_VERSION: &str = "2024-02-01";

pub fn embeddings_config(base_url: &str) -> EmbeddingsConfig {
    EmbeddingsConfig {
        model: "text-embedding-ada-002".to_string(),
        base_url: base_url.to_string(),
        api_key: OPENAI_KEY.to_string(),
        dimensions: DIMENSIONS,
        timeout_secs: 5,
        max_retries: 1,
    }
}

pub fn search_config(endpoint: &str) -> SearchConfig {
    SearchConfig {
        endpoint: endpoint.to_string(),
        api_key: SEARCH_KEY.to_string(),
        index_name: INDEX.to_string(),
        api_version: "2023-11-01".to_string(),
        top_k: 5,
        content_field: "content".to_string(),
        vector_field: "content_vector".to_string(),
        timeout_secs: 5,
        max_retries: 1,
    }
}

pub fn chat_config(endpoint: &str) -> ChatConfig {
    ChatConfig {
        endpoint: endpoint.to_string(),
        api_key: AZURE_KEY.to_string(),
        api_version: CHAT_API_VERSION.to_string(),
        deployment: DEPLOYMENT.to_string(),
        timeout_secs: 5,
        max_retries: 0,
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
    }
}

/// Full configuration with every collaborator pointed at `base_url`.
pub fn config(base_url: &str) -> Config {
    Config {
        server: ServerConfig::default(),
        search: search_config(base_url),
        embeddings: embeddings_config(base_url),
        chat: chat_config(base_url),
        session: SessionConfig::default(),
    }
}

pub fn embedding_body(count: usize, dimensions: usize) -> serde_json::Value {
    let data: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "object": "embedding",
                "index": i,
                "embedding": vec![0.1_f32; dimensions],
            })
        })
        .collect();

    json!({
        "object": "list",
        "data": data,
        "model": "text-embedding-ada-002",
        "usage": { "prompt_tokens": 3, "total_tokens": 3 }
    })
}

pub fn search_body(hits: &[(&str, f32)]) -> serde_json::Value {
    let value: Vec<_> = hits
        .iter()
        .map(|(content, score)| {
            json!({
                "@search.score": score,
                "content": content,
                "metadata": "winemag-reviews.csv",
            })
        })
        .collect();

    json!({ "value": value })
}

pub fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-35-turbo",
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": 1,
            "completion_tokens": 1,
            "total_tokens": 2
        }
    })
}

pub fn chat_path() -> String {
    format!("/openai/deployments/{DEPLOYMENT}/chat/completions")
}
