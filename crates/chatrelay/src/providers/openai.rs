use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::base::{ByteStream, Provider};
use super::configs::OpenAiProviderConfig;
use super::utils::{body_stream, completion_to_message, ensure_success, parse_json, peek_body};
use crate::errors::ProviderResult;
use crate::models::completion::CompletionRequest;
use crate::models::message::Message;

/// Bound on a whole non-streaming exchange. Streaming replies are only
/// bounded at connect time, since a long generation keeps the body open.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The upstream chat-completion service
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
    request_timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            config,
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn post(&self, messages: &[Message], stream: bool) -> ProviderResult<reqwest::Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );
        let payload = CompletionRequest {
            model: &self.config.model,
            messages,
            stream,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        debug!(model = %self.config.model, messages = messages.len(), stream, "requesting completion");

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload);
        if !stream {
            request = request.timeout(self.request_timeout);
        }

        let response = request.send().await?;

        ensure_success(response).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(&self, messages: &[Message]) -> ProviderResult<Option<ByteStream>> {
        let response = self.post(messages, true).await?;
        peek_body(body_stream(response)).await
    }

    async fn complete(&self, messages: &[Message]) -> ProviderResult<Message> {
        let response = self.post(messages, false).await?;
        let bytes = response.bytes().await?;
        completion_to_message(parse_json(&bytes)?)
    }
}
