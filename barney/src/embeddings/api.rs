use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingsConfig;
use crate::error::{BarneyError, Result, Upstream};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    config: EmbeddingsConfig,
}

impl EmbeddingApiClient {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BarneyError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Embeds a single query string. The returned vector always has the
    /// configured dimensionality.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BarneyError::contract(Upstream::Embeddings, "no embedding returned"))?;

        if embedding.len() != self.config.dimensions {
            return Err(BarneyError::contract(
                Upstream::Embeddings,
                format!(
                    "expected {} dimensions, got {}",
                    self.config.dimensions,
                    embedding.len()
                ),
            ));
        }

        Ok(embedding)
    }

    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts.to_vec(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(|e| {
                BarneyError::InvalidConfiguration {
                    var: "OPENAI_API_KEY".to_string(),
                    reason: format!("not a valid header value: {e}"),
                }
            })?,
        );

        let url = format!("{}/embeddings", self.config.base_url);

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt - 1));
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Retrying embedding request");
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
                        let body: EmbeddingResponse = resp.json().await.map_err(|e| {
                            BarneyError::contract(
                                Upstream::Embeddings,
                                format!("Failed to parse response: {e}"),
                            )
                        })?;

                        if body.data.len() != texts.len() {
                            return Err(BarneyError::contract(
                                Upstream::Embeddings,
                                format!(
                                    "requested {} embeddings, received {}",
                                    texts.len(),
                                    body.data.len()
                                ),
                            ));
                        }

                        return Ok(body.data.into_iter().map(|d| d.embedding).collect());
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(BarneyError::unavailable(
                            Upstream::Embeddings,
                            format!("authentication failed ({status})"),
                        ));
                    }

                    let body = resp.text().await.unwrap_or_default();

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_error = Some(BarneyError::unavailable(
                            Upstream::Embeddings,
                            format!("Server error {status}: {body}"),
                        ));
                        continue;
                    }

                    return Err(BarneyError::contract(
                        Upstream::Embeddings,
                        format!("API error {status}: {body}"),
                    ));
                }
                Err(e) => {
                    last_error = Some(BarneyError::unavailable(
                        Upstream::Embeddings,
                        format!("Request failed: {e}"),
                    ));
                    continue;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| BarneyError::unavailable(Upstream::Embeddings, "Unknown error")))
    }
}
