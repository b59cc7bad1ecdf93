use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::base::{ByteStream, Provider};
use super::utils::{body_stream, ensure_success, parse_json};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::completion::ChatRequest;
use crate::models::message::Message;

pub const RELAY_URL: &str = "http://127.0.0.1:3000";

/// Client side of the completion relay
pub struct RelayProvider {
    client: Client,
    base_url: String,
}

impl RelayProvider {
    pub fn new<S: Into<String>>(base_url: S) -> ProviderResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, route: &str, messages: &[Message]) -> ProviderResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, route);
        debug!(%url, messages = messages.len(), "posting conversation to relay");
        let request = ChatRequest {
            messages: messages.to_vec(),
        };
        Ok(self.client.post(&url).json(&request).send().await?)
    }
}

#[async_trait]
impl Provider for RelayProvider {
    async fn stream(&self, messages: &[Message]) -> ProviderResult<Option<ByteStream>> {
        let response = self.post("/chat", messages).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(body_stream(response)))
    }

    async fn complete(&self, messages: &[Message]) -> ProviderResult<Message> {
        let response = ensure_success(self.post("/chat/complete", messages).await?).await?;
        let bytes = response.bytes().await?;
        serde_json::from_value(parse_json(&bytes)?)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
