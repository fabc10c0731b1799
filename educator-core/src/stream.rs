//! Incremental decoding of newline-delimited generation output.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use crate::domain::GenerationChunk;
use crate::error::{EducatorError, Result};
use crate::transport::{ByteStream, TransportError};

/// Splits a byte stream into lines without assuming chunk boundaries align
/// with UTF-8 characters or newlines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// Return the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Interpretation of one line of streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// A decoded chunk.
    Chunk(GenerationChunk),
    /// An explicit `[DONE]` marker.
    Done,
    /// The backend reported a failure in place of output.
    Error(String),
    /// Blank line or framing noise.
    Skip,
}

#[derive(Deserialize)]
struct StreamPayload {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Parse a single line, tolerating SSE-style `data: ` framing.
pub fn parse_line(line: &str) -> StreamLine {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix("data:").map(str::trim).unwrap_or(trimmed);
    if payload.is_empty() {
        return StreamLine::Skip;
    }
    if payload == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<StreamPayload>(payload) {
        Ok(StreamPayload {
            error: Some(message),
            ..
        }) => StreamLine::Error(message),
        Ok(StreamPayload { response, done, .. }) => {
            StreamLine::Chunk(GenerationChunk { response, done })
        }
        Err(err) => {
            log::debug!("skipping malformed stream line: {err}");
            StreamLine::Skip
        }
    }
}

/// Lazy sequence of generated text fragments.
///
/// Each poll waits on the network only when no decoded fragment is pending.
/// Dropping the stream closes the connection; the connection is also released
/// as soon as the backend signals completion.
pub struct GenerationStream {
    inner: BoxStream<'static, Result<String>>,
}

impl GenerationStream {
    /// Wrap a raw byte stream, failing if no bytes arrive within `idle_timeout`.
    pub fn new(bytes: ByteStream, idle_timeout: Duration) -> Self {
        let state = StreamState {
            bytes: Some(bytes),
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
            idle_timeout,
            finished: false,
        };
        Self {
            inner: stream::unfold(state, next_fragment).boxed(),
        }
    }

    /// Drain the stream into a single string.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl fmt::Debug for GenerationStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationStream").finish_non_exhaustive()
    }
}

impl Stream for GenerationStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct StreamState {
    bytes: Option<ByteStream>,
    decoder: LineDecoder,
    pending: VecDeque<Result<String>>,
    idle_timeout: Duration,
    finished: bool,
}

impl StreamState {
    fn close(&mut self) {
        self.bytes = None;
        self.finished = true;
    }

    fn absorb(&mut self, line: &str) {
        if self.finished {
            return;
        }
        match parse_line(line) {
            StreamLine::Chunk(chunk) => {
                if !chunk.response.is_empty() {
                    self.pending.push_back(Ok(chunk.response));
                }
                if chunk.done {
                    self.close();
                }
            }
            StreamLine::Done => self.close(),
            StreamLine::Error(message) => {
                self.close();
                self.pending
                    .push_back(Err(EducatorError::MalformedResponse(format!(
                        "backend error: {message}"
                    ))));
            }
            StreamLine::Skip => {}
        }
    }

    fn fail(&mut self, error: TransportError) -> EducatorError {
        self.close();
        self.pending.clear();
        match error {
            TransportError::Timeout(message) | TransportError::Connect(message) => {
                EducatorError::BackendUnreachable {
                    attempts: 1,
                    message: format!("stream interrupted: {message}"),
                }
            }
            other => other.into_educator_error(1),
        }
    }
}

async fn next_fragment(mut state: StreamState) -> Option<(Result<String>, StreamState)> {
    loop {
        if let Some(item) = state.pending.pop_front() {
            return Some((item, state));
        }
        if state.finished {
            return None;
        }
        let idle_timeout = state.idle_timeout;
        let bytes = state.bytes.as_mut()?;
        match tokio::time::timeout(idle_timeout, bytes.next()).await {
            Err(_) => {
                let error = state.fail(TransportError::Timeout(format!(
                    "no output for {idle_timeout:?}"
                )));
                return Some((Err(error), state));
            }
            Ok(Some(Err(err))) => {
                let error = state.fail(err);
                return Some((Err(error), state));
            }
            Ok(Some(Ok(chunk))) => {
                for line in state.decoder.push(&chunk) {
                    state.absorb(&line);
                }
            }
            Ok(None) => {
                if let Some(line) = state.decoder.finish() {
                    state.absorb(&line);
                }
                state.close();
            }
        }
    }
}
