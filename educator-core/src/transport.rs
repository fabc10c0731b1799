//! Low-level HTTP access to the model backend.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Serialize;

use crate::error::{EducatorError, Result};
use crate::retry::AttemptFailure;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, TransportError>> + Send + 'a>>;

/// Raw response body chunks from a streaming call.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, TransportError>> + Send>>;

/// Body of a `POST /api/generate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratePayload<'a> {
    /// Model identifier.
    pub model: &'a str,
    /// Prompt text.
    pub prompt: &'a str,
    /// Whether the backend should stream.
    pub stream: bool,
}

/// Failure talking to the backend, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    Connect(String),
    /// The call or a stream read exceeded its timeout.
    Timeout(String),
    /// The backend answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// The backend answered but stopped sending the body within the timeout.
    Stalled(String),
    /// Reading the response body failed after the backend answered.
    Body(String),
    /// The request could not be built.
    Request(String),
}

impl TransportError {
    /// Whether the failure happened before the backend saw the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }

    /// Convert into the public error taxonomy.
    pub fn into_educator_error(self, attempts: u32) -> EducatorError {
        match self {
            Self::Connect(message) | Self::Timeout(message) | Self::Stalled(message) => {
                EducatorError::BackendUnreachable { attempts, message }
            }
            Self::Status { status, body } => EducatorError::BackendRejected { status, body },
            Self::Body(message) => EducatorError::MalformedResponse(message),
            Self::Request(message) => EducatorError::InvalidInput(message),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(message) => write!(f, "connection failed: {message}"),
            Self::Timeout(message) => write!(f, "timed out: {message}"),
            Self::Stalled(message) => write!(f, "response stalled: {message}"),
            Self::Status { status, .. } => write!(f, "unexpected status {status}"),
            Self::Body(message) => write!(f, "failed to read body: {message}"),
            Self::Request(message) => write!(f, "invalid request: {message}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for AttemptFailure {
    fn from(value: TransportError) -> Self {
        if value.is_retryable() {
            AttemptFailure::Retryable(value.to_string())
        } else {
            AttemptFailure::Terminal(value.into_educator_error(1))
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout(value.to_string())
        } else if value.is_connect() {
            Self::Connect(value.to_string())
        } else if value.is_builder() {
            Self::Request(value.to_string())
        } else if value.is_body() || value.is_decode() {
            Self::Body(value.to_string())
        } else if let Some(status) = value.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            // Errors while sending without a response are treated as connection loss.
            Self::Connect(value.to_string())
        }
    }
}

/// Endpoint-level access to an Ollama-compatible backend.
///
/// Non-success statuses are reported as [`TransportError::Status`]; callers
/// decode successful bodies themselves.
pub trait Transport: Send + Sync {
    /// `GET /api/tags`, returning the raw body.
    fn list_tags<'a>(&'a self, timeout: Duration) -> TransportFuture<'a, String>;

    /// Buffered `POST /api/generate`, returning the raw body.
    fn generate<'a>(
        &'a self,
        payload: &'a GeneratePayload<'a>,
        timeout: Duration,
    ) -> TransportFuture<'a, String>;

    /// Streaming `POST /api/generate`, resolved once response headers arrive.
    fn generate_stream<'a>(
        &'a self,
        payload: &'a GeneratePayload<'a>,
        timeout: Duration,
    ) -> TransportFuture<'a, ByteStream>;

    /// `POST /api/show` for a single model, returning the raw body.
    fn show<'a>(&'a self, name: &'a str, timeout: Duration) -> TransportFuture<'a, String>;
}

/// Reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent("educator-core")
            .build()
            .map_err(|err| EducatorError::InvalidInput(format!("http client: {err}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Build a transport around an existing client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Transport for HttpTransport {
    fn list_tags<'a>(&'a self, timeout: Duration) -> TransportFuture<'a, String> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url("/api/tags"))
                .timeout(timeout)
                .send()
                .await?;
            read_text(response).await
        })
    }

    fn generate<'a>(
        &'a self,
        payload: &'a GeneratePayload<'a>,
        timeout: Duration,
    ) -> TransportFuture<'a, String> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("/api/generate"))
                .json(payload)
                .timeout(timeout)
                .send()
                .await?;
            read_text(response).await
        })
    }

    fn generate_stream<'a>(
        &'a self,
        payload: &'a GeneratePayload<'a>,
        timeout: Duration,
    ) -> TransportFuture<'a, ByteStream> {
        Box::pin(async move {
            // A request-level timeout would cap the whole stream, so only the
            // wait for response headers is bounded here.
            let send = self.client.post(self.url("/api/generate")).json(payload).send();
            let response = tokio::time::timeout(timeout, send)
                .await
                .map_err(|_| {
                    TransportError::Timeout(format!("no response within {timeout:?}"))
                })??;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from));
            Ok(Box::pin(stream) as ByteStream)
        })
    }

    fn show<'a>(&'a self, name: &'a str, timeout: Duration) -> TransportFuture<'a, String> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("/api/show"))
                .json(&serde_json::json!({ "name": name }))
                .timeout(timeout)
                .send()
                .await?;
            read_text(response).await
        })
    }
}

async fn read_text(response: Response) -> std::result::Result<String, TransportError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| match TransportError::from(err) {
            // Headers already arrived; the request is not resent.
            TransportError::Timeout(message) => TransportError::Stalled(message),
            other => other,
        })?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
