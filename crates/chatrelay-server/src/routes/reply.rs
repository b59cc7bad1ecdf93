use crate::error::RelayError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use chatrelay::models::completion::ChatRequest;
use chatrelay::models::message::Message;
use chatrelay::providers::base::ByteStream;
use futures::{stream::StreamExt, Stream};
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const CHANNEL_CAPACITY: usize = 100;

type Chunk = Result<Bytes, io::Error>;

/// Event-stream response body fed by the upstream pump. An error item
/// aborts the response, so the client never mistakes a truncated
/// upstream for a finished one.
pub struct SseResponse {
    rx: ReceiverStream<Chunk>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<Chunk>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

/// Copy upstream chunks to the client unmodified until either side is done.
/// Returning drops both the upstream body and the sender, which closes the
/// client stream; an upstream failure is forwarded first so it aborts it.
async fn pump(mut upstream: ByteStream, tx: mpsc::Sender<Chunk>) {
    let mut relayed = 0usize;
    loop {
        tokio::select! {
            _ = tx.closed() => {
                tracing::info!(relayed, "client disconnected, releasing upstream");
                break;
            }
            chunk = upstream.next() => match chunk {
                Some(Ok(bytes)) => {
                    relayed += bytes.len();
                    if tx.send(Ok(bytes)).await.is_err() {
                        tracing::info!(relayed, "client disconnected, releasing upstream");
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(relayed, "upstream stream failed: {}", e);
                    let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
                    break;
                }
                None => {
                    tracing::debug!(relayed, "upstream stream finished");
                    break;
                }
            }
        }
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, RelayError> {
    if request.messages.is_empty() {
        return Err(RelayError::EmptyConversation);
    }
    tracing::info!(messages = request.messages.len(), "relaying streaming completion");

    let upstream = match state.provider.stream(&request.messages).await? {
        Some(upstream) => upstream,
        None => {
            tracing::warn!("upstream produced no body");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
    };

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(pump(upstream, tx));

    Ok(SseResponse::new(ReceiverStream::new(rx)).into_response())
}

// Non-streaming: wait for the whole reply and return it as one message
async fn complete_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Message>, RelayError> {
    if request.messages.is_empty() {
        return Err(RelayError::EmptyConversation);
    }
    tracing::info!(messages = request.messages.len(), "relaying completion");

    let message = state.provider.complete(&request.messages).await?;
    Ok(Json(Message::assistant(message.content)))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handler))
        .route("/chat/complete", post(complete_handler))
        .with_state(state)
}
