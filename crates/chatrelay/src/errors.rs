use thiserror::Error;

/// Failures talking to a completion endpoint (upstream service or relay)
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("Stream interrupted: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Http(e) if e.is_timeout())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Violations of the single in-flight message rule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("An assistant message is still being generated")]
    InFlight,

    #[error("No assistant message is being generated for this handle")]
    StaleHandle,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A reply is already streaming for this conversation")]
    Busy,

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
