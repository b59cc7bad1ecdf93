use futures::stream::{self, StreamExt};
use serde_json::Value;

use super::base::ByteStream;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::completion::Completion;
use crate::models::message::Message;

/// Turn a non-2xx response into `ProviderError::Status`, keeping the body for diagnostics
pub async fn ensure_success(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// The response body as a chunk stream; failures after the headers are transport errors
pub fn body_stream(response: reqwest::Response) -> ByteStream {
    response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| ProviderError::Transport(e.to_string())))
        .boxed()
}

/// Wait for the first non-empty chunk. A body that ends before yielding
/// any byte counts as no body at all.
pub async fn peek_body(mut body: ByteStream) -> ProviderResult<Option<ByteStream>> {
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        if !chunk.is_empty() {
            return Ok(Some(stream::once(async move { Ok(chunk) }).chain(body).boxed()));
        }
    }
    Ok(None)
}

pub fn parse_json(bytes: &[u8]) -> ProviderResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Extract the first generated message from a complete chat-completion response
pub fn completion_to_message(response: Value) -> ProviderResult<Message> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::Upstream(message));
    }

    let completion: Completion = serde_json::from_value(response)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))
}
