//! Outbound streaming completion client.
//!
//! Issues the provider `POST {base_url}/chat/completions` request with
//! `stream: true` and exposes the response body as a lazy byte-chunk
//! source. Dropping the source aborts the request and releases the
//! connection.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;

use crate::config::UpstreamConfig;

/// Lazy, cancelable source of response body chunks.
pub type ByteChunkSource = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// Failures from the completion provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to reach completion provider: {0}")]
    ConnectFailed(String),

    #[error("completion provider returned {code} {status_text}")]
    NonSuccessStatus { code: u16, status_text: String },

    #[error("completion provider timed out")]
    TimedOut,

    #[error("request cancelled")]
    Cancelled,
}

impl UpstreamError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::TimedOut
        } else {
            UpstreamError::ConnectFailed(err.to_string())
        }
    }
}

/// Completion request body (OpenAI-compatible).
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OutboundMessage<'a>>,
    stream: bool,
    temperature: f32,
}

/// A chat message in the outbound request.
#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Client for the configured completion provider.
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Build a client over a shared HTTP connection pool.
    ///
    /// The connect timeout lives on `http`; stream liveness is enforced by
    /// the caller's per-chunk idle timeout, not a wall-clock deadline.
    pub fn new(http: reqwest::Client, config: UpstreamConfig) -> Self {
        Self { http, config }
    }

    /// Open a streaming completion for one user message.
    ///
    /// Any non-2xx status is raised here, before streaming begins. On
    /// success the response body is returned as a byte-chunk source
    /// consumed by the line decoder.
    pub async fn open(&self, message: &str) -> Result<ByteChunkSource, UpstreamError> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages: vec![OutboundMessage {
                role: "user",
                content: message,
            }],
            stream: true,
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %url, "Failed to reach completion provider");
                UpstreamError::from_reqwest(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, url = %url, "Completion provider returned error");
            return Err(UpstreamError::NonSuccessStatus {
                code: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or("Unknown Status")
                    .to_string(),
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(UpstreamError::from_reqwest));

        Ok(Box::pin(stream))
    }
}
