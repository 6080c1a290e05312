//! The narrow "complete this prompt" capability used by deep evaluation.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;

use crate::config::CompletionSettings;
use crate::error::LivelyError;

/// Sampling options for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&CompletionSettings> for CompletionOptions {
    fn from(settings: &CompletionSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<String, LivelyError>;
}

/// Completion over any OpenAI-compatible chat endpoint.
pub struct OpenAICompletionClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl OpenAICompletionClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LivelyError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                LivelyError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(api_base.into());

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: model.into(),
            max_retries: 3,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OpenAICompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<String, LivelyError> {
        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: prompt.to_string().into(),
                name: None,
            },
        )];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(options.temperature)
            .max_completion_tokens(options.max_tokens)
            .messages(messages)
            .build()?;

        // Exponential backoff: 250ms, 500ms, ...
        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(125 << attempt)).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    return response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .filter(|c| !c.trim().is_empty())
                        .ok_or_else(|| {
                            LivelyError::CompletionError("empty completion".to_string())
                        });
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Completion attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map(LivelyError::from).unwrap_or_else(|| {
            LivelyError::CompletionError("Unknown API error after retries".to_string())
        }))
    }
}
