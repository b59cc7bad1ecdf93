use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::base::{ByteStream, Provider};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;

/// What the mock answers to the next `stream` call
pub enum MockStream {
    /// These chunks, then end of body
    Chunks(Vec<Bytes>),
    /// These chunks, then the body stays open forever
    Hanging(Vec<Bytes>),
    /// These chunks, then a transport failure
    Broken(Vec<Bytes>),
    /// An arbitrary body
    Body(ByteStream),
    /// The endpoint produced no body
    NoBody,
    /// The endpoint answered with this status
    Status(u16),
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Default)]
pub struct MockProvider {
    streams: Mutex<VecDeque<MockStream>>,
    replies: Mutex<VecDeque<ProviderResult<Message>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

fn to_bytes<I, S>(chunks: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    chunks
        .into_iter()
        .map(|chunk| Bytes::copy_from_slice(chunk.as_ref().as_bytes()))
        .collect()
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, stream: MockStream) -> Self {
        self.streams.lock().unwrap().push_back(stream);
        self
    }

    /// Queue a body made of these text chunks
    pub fn with_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_stream(MockStream::Chunks(to_bytes(chunks)))
    }

    /// Queue a body made of these text chunks that never ends
    pub fn with_hanging_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_stream(MockStream::Hanging(to_bytes(chunks)))
    }

    /// Queue a body made of these text chunks that then fails
    pub fn with_broken_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_stream(MockStream::Broken(to_bytes(chunks)))
    }

    pub fn with_reply(self, reply: ProviderResult<Message>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Conversations received so far, one entry per call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(&self, messages: &[Message]) -> ProviderResult<Option<ByteStream>> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let next = self.streams.lock().unwrap().pop_front();
        match next.unwrap_or(MockStream::NoBody) {
            MockStream::Chunks(chunks) => Ok(Some(stream::iter(chunks.into_iter().map(Ok)).boxed())),
            MockStream::Hanging(chunks) => Ok(Some(
                stream::iter(chunks.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed(),
            )),
            MockStream::Broken(chunks) => Ok(Some(
                stream::iter(chunks.into_iter().map(Ok))
                    .chain(stream::once(async {
                        Err(ProviderError::Transport("connection reset".to_string()))
                    }))
                    .boxed(),
            )),
            MockStream::Body(body) => Ok(Some(body)),
            MockStream::NoBody => Ok(None),
            MockStream::Status(status) => Err(ProviderError::Status {
                status,
                body: String::new(),
            }),
        }
    }

    async fn complete(&self, messages: &[Message]) -> ProviderResult<Message> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("no reply configured".to_string())))
    }
}
