//! HTTP request handlers.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use super::server::AppState;
use crate::error::Error;
use crate::relay::{run_relay, SessionState};
use crate::storage::{MessageKind, NewMessage};

/// Response header: correlation ID (UUID v4) for log cross-referencing.
pub const RELAY_REQUEST_ID_HEADER: &str = "x-chatrelay-request-id";

/// Frames buffered between the relay task and the response body.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Inbound chat request body.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Handle POST /api/chat
///
/// Validates before anything is committed to the wire: an empty message
/// or a failed upstream open returns a status-coded JSON error. Once the
/// streaming response is returned, the headers are out and every later
/// failure is reported as an in-band `data: {"error": ...}` frame by the
/// relay task.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, Error> {
    let correlation_id = uuid::Uuid::new_v4().to_string();

    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::BadRequest("message must not be empty".to_string()))?
        .to_string();

    tracing::info!(
        request_id = %correlation_id,
        chars = message.len(),
        "Received chat request"
    );

    // Upstream is opened before the response is built, so a connect
    // failure or non-2xx status still reaches the caller as a status code.
    let source = state.upstream.open(&message).await?;

    let (tx, rx) = tokio::sync::mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let idle_timeout = state.idle_timeout;
    let task_id = correlation_id.clone();
    tokio::spawn(async move {
        let outcome = run_relay(source, idle_timeout, tx).await;
        match outcome.state {
            SessionState::Completed => tracing::info!(
                request_id = %task_id,
                chars = outcome.accumulated_text.len(),
                "Relay completed"
            ),
            state => tracing::warn!(
                request_id = %task_id,
                state = ?state,
                relayed_chars = outcome.accumulated_text.len(),
                "Relay ended without completing"
            ),
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header(
            HeaderName::from_static(RELAY_REQUEST_ID_HEADER),
            HeaderValue::from_str(&correlation_id)
                .map_err(|e| Error::Internal(e.to_string()))?,
        )
        .body(body)
        .map_err(|e| Error::Internal(e.to_string()))?;

    Ok(response)
}

/// A chat message as exposed over the API.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Handle GET /api/messages - full history, oldest first.
pub async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<ApiMessage>>, Error> {
    let messages = state
        .store
        .list()
        .await?
        .into_iter()
        .map(|row| ApiMessage {
            id: row.message_id,
            content: row.content,
            kind: row.kind,
        })
        .collect();

    Ok(Json(messages))
}

/// Inbound message-save body. Fields are optional so missing ones report
/// as a 400 with the standard error envelope instead of an extractor
/// rejection.
#[derive(Debug, Deserialize)]
pub struct SaveMessageRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Handle POST /api/messages - persist one message.
pub async fn save_message(
    State(state): State<AppState>,
    Json(request): Json<SaveMessageRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    let (id, content, kind) = match (request.id, request.content, request.kind) {
        (Some(id), Some(content), Some(kind)) if !id.is_empty() && !content.is_empty() => {
            (id, content, kind)
        }
        _ => {
            return Err(Error::BadRequest(
                "id, content and type are required".to_string(),
            ))
        }
    };

    let kind = MessageKind::parse(&kind)
        .ok_or_else(|| Error::BadRequest(format!("unknown message type '{}'", kind)))?;

    state
        .store
        .append(NewMessage {
            message_id: id,
            content,
            kind,
        })
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatrelay"
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "route not found" })),
    )
}
