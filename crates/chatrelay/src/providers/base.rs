use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;

/// Raw response body of an incremental completion, in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes, ProviderError>>;

/// Base trait for chat-completion endpoints (the upstream service, or the relay in front of it)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Request an incremental completion of the conversation.
    ///
    /// Returns the raw event-stream body, or `None` when the endpoint
    /// answered without producing any body.
    async fn stream(&self, messages: &[Message]) -> ProviderResult<Option<ByteStream>>;

    /// Request a single complete reply to the conversation
    async fn complete(&self, messages: &[Message]) -> ProviderResult<Message>;
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    async fn stream(&self, messages: &[Message]) -> ProviderResult<Option<ByteStream>> {
        (**self).stream(messages).await
    }

    async fn complete(&self, messages: &[Message]) -> ProviderResult<Message> {
        (**self).complete(messages).await
    }
}
