use super::message::Message;
use super::role::Role;
use crate::errors::ConversationError;

/// Handle to the assistant message currently being generated.
///
/// Handles are only valid for the exchange that created them; once the
/// message is finished, appending through an old handle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    index: usize,
    generation: u64,
}

/// An ordered list of messages with at most one mutable (in-flight) message,
/// which is always the last one.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    in_flight: Option<InFlight>,
    generation: u64,
}

impl Conversation {
    /// Start a conversation whose first message carries the system prompt
    pub fn new<S: Into<String>>(system_prompt: S) -> Self {
        Self::from_messages(vec![Message::system(system_prompt)])
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Conversation {
            messages,
            in_flight: None,
            generation: 0,
        }
    }

    /// Append a finished message
    pub fn push(&mut self, message: Message) -> Result<(), ConversationError> {
        if self.in_flight.is_some() {
            return Err(ConversationError::InFlight);
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append an empty assistant message and make it the in-flight message
    pub fn begin_assistant(&mut self) -> Result<InFlight, ConversationError> {
        if self.in_flight.is_some() {
            return Err(ConversationError::InFlight);
        }
        self.generation += 1;
        let handle = InFlight {
            index: self.messages.len(),
            generation: self.generation,
        };
        self.messages.push(Message::assistant(""));
        self.in_flight = Some(handle);
        Ok(handle)
    }

    /// Extend the in-flight message through its handle
    pub fn append(&mut self, handle: InFlight, text: &str) -> Result<(), ConversationError> {
        if self.in_flight != Some(handle) {
            return Err(ConversationError::StaleHandle);
        }
        let message = self
            .messages
            .get_mut(handle.index)
            .ok_or(ConversationError::StaleHandle)?;
        message.push_text(text);
        Ok(())
    }

    /// Freeze the in-flight message, returning it if there was one
    pub fn finish(&mut self) -> Option<&Message> {
        let handle = self.in_flight.take()?;
        self.messages.get(handle.index)
    }

    pub fn in_flight(&self) -> Option<&Message> {
        self.in_flight
            .and_then(|handle| self.messages.get(handle.index))
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Every message, in conversation order. This is what goes upstream.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages shown to the user; system instructions are left out
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|message| message.role != Role::System)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
