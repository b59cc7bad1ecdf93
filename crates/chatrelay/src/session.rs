use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::errors::{ConversationError, SessionError};
use crate::models::conversation::{Conversation, InFlight};
use crate::models::delta::DeltaEvent;
use crate::models::message::Message;
use crate::providers::base::Provider;
use crate::stream::delta_events;

/// The presentation side of a session: draws the conversation as it changes
pub trait Renderer {
    /// Called after every change to the conversation, including each new fragment
    fn render(&mut self, conversation: &Conversation);

    /// A reply has been requested; input should be held back
    fn show_busy(&mut self) {}

    /// The reply is over; input may resume
    fn hide_busy(&mut self) {}
}

/// How a submitted exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The stream signalled `Done`
    Completed,
    /// The stream ended without `Done`
    Incomplete,
    /// The endpoint produced no body, so no assistant message was added
    NoContent,
    /// The transport failed mid-stream; the partial reply is kept
    Interrupted,
}

/// The assistant message of one exchange. Dropping it freezes the message,
/// so an abandoned `submit` never leaves a mutable message behind.
struct Reply<'a> {
    conversation: &'a mut Conversation,
    handle: InFlight,
}

impl<'a> Reply<'a> {
    fn begin(conversation: &'a mut Conversation) -> Result<Self, ConversationError> {
        let handle = conversation.begin_assistant()?;
        Ok(Self {
            conversation,
            handle,
        })
    }

    fn append(&mut self, text: &str) -> Result<(), ConversationError> {
        self.conversation.append(self.handle, text)
    }

    fn conversation(&self) -> &Conversation {
        self.conversation
    }
}

impl Drop for Reply<'_> {
    fn drop(&mut self) {
        self.conversation.finish();
    }
}

/// Owns a conversation and grows it one exchange at a time
pub struct Session<P> {
    provider: P,
    conversation: Conversation,
}

impl<P: Provider> Session<P> {
    pub fn new(provider: P, conversation: Conversation) -> Self {
        Self {
            provider,
            conversation,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Send `text` as the next user message and stream the reply into the conversation.
    ///
    /// The user message stays in the conversation even if the reply cannot be
    /// opened; retrying is up to the caller.
    pub async fn submit<R>(
        &mut self,
        text: &str,
        renderer: &mut R,
    ) -> Result<SubmitOutcome, SessionError>
    where
        R: Renderer + ?Sized,
    {
        if self.conversation.is_in_flight() {
            return Err(SessionError::Busy);
        }

        self.conversation.push(Message::user(text))?;
        renderer.render(&self.conversation);

        renderer.show_busy();
        let outcome = self.stream_reply(renderer).await;
        renderer.hide_busy();
        outcome
    }

    async fn stream_reply<R>(&mut self, renderer: &mut R) -> Result<SubmitOutcome, SessionError>
    where
        R: Renderer + ?Sized,
    {
        let body = match self.provider.stream(self.conversation.messages()).await? {
            Some(body) => body,
            None => {
                warn!("completion endpoint produced no content");
                return Ok(SubmitOutcome::NoContent);
            }
        };

        let mut reply = Reply::begin(&mut self.conversation)?;
        renderer.render(reply.conversation());

        let mut events = delta_events(body);
        while let Some(event) = events.next().await {
            match event {
                Ok(DeltaEvent::ContentFragment(text)) => {
                    reply.append(&text)?;
                    renderer.render(reply.conversation());
                }
                Ok(DeltaEvent::Ignorable) => {}
                Ok(DeltaEvent::Done) => {
                    debug!("reply complete");
                    return Ok(SubmitOutcome::Completed);
                }
                Err(e) => {
                    error!(error = %e, "reply stream interrupted, keeping partial reply");
                    return Ok(SubmitOutcome::Interrupted);
                }
            }
        }

        debug!("reply stream ended without a done marker");
        Ok(SubmitOutcome::Incomplete)
    }
}

/// A session shared between tasks. Overlapping submissions are rejected
/// with [`SessionError::Busy`] rather than queued.
pub struct SharedSession<P> {
    inner: Arc<Mutex<Session<P>>>,
}

impl<P> Clone for SharedSession<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Provider> SharedSession<P> {
    pub fn new(session: Session<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn submit<R>(&self, text: &str, renderer: &mut R) -> Result<SubmitOutcome, SessionError>
    where
        R: Renderer + ?Sized,
    {
        let mut session = self.inner.try_lock().map_err(|_| SessionError::Busy)?;
        session.submit(text, renderer).await
    }

    /// A snapshot of the conversation; waits for any exchange in progress
    pub async fn conversation(&self) -> Conversation {
        self.inner.lock().await.conversation().clone()
    }
}
