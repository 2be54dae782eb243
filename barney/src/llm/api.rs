use std::time::Duration;

use async_openai::{
    config::AzureConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;

use crate::{
    config::ChatConfig,
    error::{BarneyError, Result, Upstream},
    llm::ChatCompletion,
    models::{PromptMessage, Role},
};

/// Chat completions against an Azure OpenAI deployment.
#[derive(Clone)]
pub struct AzureChatClient {
    client: Client<AzureConfig>,
    deployment: String,
    max_retries: u32,
}

impl AzureChatClient {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let azure_config = AzureConfig::new()
            .with_api_base(config.endpoint.clone())
            .with_api_version(config.api_version.clone())
            .with_deployment_id(config.deployment.clone())
            .with_api_key(config.api_key.clone());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                BarneyError::Internal(format!("Failed to create chat HTTP client: {error}"))
            })?;

        // async-openai retries 429/5xx on its own with exponential backoff for
        // up to 15 minutes by default. Keep that inside our own timeout.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(azure_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            deployment: config.deployment.clone(),
            max_retries: config.max_retries,
        })
    }

    fn build_request(&self, messages: &[PromptMessage]) -> Result<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        CreateChatCompletionRequestArgs::default()
            .model(self.deployment.clone())
            .messages(messages)
            .build()
            .map_err(|error| BarneyError::Internal(format!("Invalid chat request: {error}")))
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BarneyError::contract(Upstream::Chat, "response contained no choices"))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(BarneyError::contract(
                Upstream::Chat,
                "response contained empty content",
            ));
        }

        Ok(message)
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "429"
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("access denied")
            || message.contains("invalid api key")
            || message.contains("invalid subscription key")
            || code == "401"
            || code.contains("invalid_api_key")
            || code.contains("authentication")
            || error_type.contains("authentication")
    }

    fn map_openai_error(error: OpenAIError) -> BarneyError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                let detail = if reqwest_error.is_timeout() {
                    format!("request timed out: {reqwest_error}")
                } else {
                    format!("request failed: {reqwest_error}")
                };
                BarneyError::unavailable(Upstream::Chat, detail)
            }
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(&api_error) => {
                BarneyError::unavailable(
                    Upstream::Chat,
                    format!("authentication failed: {api_error}"),
                )
            }
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(&api_error) => {
                BarneyError::unavailable(Upstream::Chat, format!("rate limited: {api_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                BarneyError::unavailable(Upstream::Chat, format!("API error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                BarneyError::contract(Upstream::Chat, format!("failed to parse response: {err}"))
            }
            OpenAIError::InvalidArgument(message) => BarneyError::Internal(message),
            other => BarneyError::unavailable(Upstream::Chat, other.to_string()),
        }
    }
}

fn to_request_message(message: &PromptMessage) -> Result<ChatCompletionRequestMessage> {
    let invalid = |error: OpenAIError| {
        BarneyError::Internal(format!("Invalid {} message: {error}", message.role))
    };

    let request_message = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.as_str())
            .build()
            .map_err(invalid)?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.as_str())
            .build()
            .map_err(invalid)?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.as_str())
            .build()
            .map_err(invalid)?
            .into(),
    };

    Ok(request_message)
}

#[async_trait]
impl ChatCompletion for AzureChatClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        if messages.is_empty() {
            return Err(BarneyError::Validation(
                "Chat request needs at least one message".to_string(),
            ));
        }

        let mut last_error: Option<BarneyError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(messages)?;

            match self.client.chat().create(request).await {
                Ok(response) => {
                    let content = Self::extract_content(response)?;
                    tracing::debug!(
                        deployment = %self.deployment,
                        response_len = content.len(),
                        "Chat completion received"
                    );
                    return Ok(content);
                }
                Err(error) => {
                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.max_retries {
                        tracing::warn!(attempt, error = %mapped_error, "Retrying chat completion");
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BarneyError::unavailable(Upstream::Chat, "completion failed after retries")
        }))
    }

    fn model(&self) -> &str {
        &self.deployment
    }
}
