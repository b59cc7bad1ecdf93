use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatrelay::errors::ProviderError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a configuration path such as `provider.api_key` to the environment variable that sets it
pub fn to_env_var(field: &str) -> String {
    format!("CHATRELAY_{}", field.replace('.', "__").to_uppercase())
}

/// Why a relay request could not be served
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Conversation has no messages")]
    EmptyConversation,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::EmptyConversation => StatusCode::BAD_REQUEST,
            RelayError::Provider(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "relay request failed: {}", self);
        } else {
            tracing::warn!(%status, "rejected relay request: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
