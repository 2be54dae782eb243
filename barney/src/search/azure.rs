use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::embeddings::EmbeddingApiClient;
use crate::error::{BarneyError, Result, Upstream};
use crate::models::RetrievedPassage;

use super::PassageSearch;

const METADATA_FIELD: &str = "metadata";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    select: String,
    top: usize,
    vector_queries: Vec<VectorQuery<'a>>,
}

#[derive(Debug, Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    fields: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "@search.score")]
    score: f32,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// Vector search against an Azure AI Search index. Queries are embedded with
/// the same model used to populate the index, then matched against the
/// configured vector field.
#[derive(Clone)]
pub struct AzureSearchClient {
    client: Client,
    embeddings: EmbeddingApiClient,
    config: SearchConfig,
}

impl AzureSearchClient {
    pub fn new(config: &SearchConfig, embeddings: EmbeddingApiClient) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BarneyError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            embeddings,
            config: config.clone(),
        })
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.config.endpoint, self.config.index_name, self.config.api_version
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                BarneyError::InvalidConfiguration {
                    var: "SEARCH_API_KEY".to_string(),
                    reason: format!("not a valid header value: {e}"),
                }
            })?,
        );
        Ok(headers)
    }

    async fn vector_search(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let request = SearchRequest {
            select: format!("{},{}", self.config.content_field, METADATA_FIELD),
            top: top_k,
            vector_queries: vec![VectorQuery {
                kind: "vector",
                vector,
                fields: &self.config.vector_field,
                k: top_k,
            }],
        };

        let url = self.search_url();
        let headers = self.headers()?;

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt - 1));
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Retrying search request");
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body: SearchResponse = resp.json().await.map_err(|e| {
                            BarneyError::contract(
                                Upstream::Search,
                                format!("Failed to parse response: {e}"),
                            )
                        })?;
                        return self.collect_passages(body);
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(BarneyError::unavailable(
                            Upstream::Search,
                            format!("authentication failed ({status})"),
                        ));
                    }

                    let body = resp.text().await.unwrap_or_default();

                    // The index itself is missing.
                    if status == StatusCode::NOT_FOUND {
                        return Err(BarneyError::unavailable(
                            Upstream::Search,
                            format!("index '{}' not found: {body}", self.config.index_name),
                        ));
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_error = Some(BarneyError::unavailable(
                            Upstream::Search,
                            format!("Server error {status}: {body}"),
                        ));
                        continue;
                    }

                    return Err(BarneyError::contract(
                        Upstream::Search,
                        format!("API error {status}: {body}"),
                    ));
                }
                Err(e) => {
                    last_error = Some(BarneyError::unavailable(
                        Upstream::Search,
                        format!("Request failed: {e}"),
                    ));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BarneyError::unavailable(Upstream::Search, "Unknown error")))
    }

    fn collect_passages(&self, body: SearchResponse) -> Result<Vec<RetrievedPassage>> {
        body.value
            .into_iter()
            .map(|mut hit| {
                let content = match hit.fields.remove(&self.config.content_field) {
                    Some(Value::String(content)) => content,
                    Some(other) => {
                        return Err(BarneyError::contract(
                            Upstream::Search,
                            format!(
                                "field `{}` is not a string: {other}",
                                self.config.content_field
                            ),
                        ))
                    }
                    None => {
                        return Err(BarneyError::contract(
                            Upstream::Search,
                            format!("missing field `{}`", self.config.content_field),
                        ))
                    }
                };

                let metadata = match hit.fields.remove(METADATA_FIELD) {
                    Some(Value::String(metadata)) => Some(metadata),
                    _ => None,
                };

                Ok(RetrievedPassage {
                    content,
                    score: hit.score,
                    metadata,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PassageSearch for AzureSearchClient {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let vector = self.embeddings.embed_query(query).await?;
        let passages = self.vector_search(&vector, top_k).await?;

        tracing::debug!(
            index = %self.config.index_name,
            count = passages.len(),
            top_score = passages.first().map(|p| p.score),
            "Vector search completed"
        );

        Ok(passages)
    }
}
