//! The transport abstraction (component C): a pluggable, byte-framed duplex
//! carrier of [`JsonRpcMessage`]s, plus the retry wrapper and health-check
//! helper shared by every binding.
//!
//! Two bindings live alongside this trait: [`stdio`] (newline-delimited JSON
//! over a child process's stdio) and [`sse_http`] (Server-Sent Events for
//! inbound, HTTP POST for outbound). Both are built from the same primitives
//! defined here so retry/backoff and size-guarding behave identically.

pub mod error;
pub mod health;
mod retry;
pub mod sse_http;
pub mod stdio;

pub use error::{TransportError, TransportResult};
pub use health::HealthEvent;
pub use retry::{BackoffPolicy, RetryPolicy};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::jsonrpc::{JsonRpcMessage, DEFAULT_MAX_MESSAGE_SIZE};

/// Lifecycle state of a transport. Distinct from [`crate::endpoint::EndpointState`],
/// which layers the protocol-level `Initializing`/`Running` phases on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

impl TransportState {
    pub fn is_connected(&self) -> bool {
        matches!(self, TransportState::Connected)
    }
}

/// A stream of inbound messages. Terminates (yields no further items) once
/// the connection is lost; the last item before termination may be an
/// `Err` carrying the reason.
pub type MessageStream = Pin<Box<dyn Stream<Item = TransportResult<JsonRpcMessage>> + Send>>;

/// Abstract byte-framed duplex carrier of JSON-RPC messages.
///
/// Implementations own their mutable state and expose it only through
/// serialized async calls (actor discipline, §5): no lock is held across an
/// `.await` on shared state.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Current transport state, observed synchronously.
    fn state(&self) -> TransportState;

    /// Subscribe to state transitions. The returned receiver observes every
    /// subsequent change starting from the current value.
    fn state_stream(&self) -> watch::Receiver<TransportState>;

    /// Take ownership of the inbound message stream. Callable once; a
    /// second call returns a stream that yields nothing, since the first
    /// caller already owns the underlying channel.
    fn take_messages(&mut self) -> MessageStream;

    /// Establish the underlying link. Returns once `Connected` is
    /// observable on `state()`.
    async fn start(&mut self) -> TransportResult<()>;

    /// Idempotent. Transitions to `Disconnected` and finishes the message
    /// stream cleanly; a second call is a no-op.
    async fn stop(&mut self) -> TransportResult<()>;

    /// Serialize and write `message`, enforcing `max_message_size` and the
    /// optional deadline.
    async fn send(&mut self, message: &JsonRpcMessage, timeout: Option<Duration>) -> TransportResult<()>;

    /// Whether this transport should be wrapped by the retry policy when
    /// establishing its link (the SSE+HTTP transport is; the stdio
    /// transport is not, since a crashed child cannot usefully be retried
    /// by redialing the same pipe).
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Serialize `message`, rejecting it locally if it would exceed
/// `max_size` once encoded. Nothing is written to the transport when this
/// returns an error (the boundary behavior in §8).
pub fn validate(message: &JsonRpcMessage, max_size: usize) -> TransportResult<Vec<u8>> {
    let encoded = message
        .to_line()
        .map_err(|e| TransportError::InvalidMessage(e.to_string()))?
        .into_bytes();
    if encoded.len() > max_size {
        return Err(TransportError::MessageTooLarge {
            size: encoded.len(),
            max: max_size,
        });
    }
    Ok(encoded)
}

pub fn validate_default(message: &JsonRpcMessage) -> TransportResult<Vec<u8>> {
    validate(message, DEFAULT_MAX_MESSAGE_SIZE)
}

/// Decode a single line as exactly one [`JsonRpcMessage`]. Malformed frames
/// are reported as `InvalidMessage` rather than panicking the reader task.
pub fn parse(line: &str) -> TransportResult<JsonRpcMessage> {
    JsonRpcMessage::from_line(line).map_err(|e| TransportError::InvalidMessage(e.to_string()))
}

/// Build a `(sender, MessageStream)` pair: the transport's background task
/// holds the sender, `take_messages` hands out the receiver half wrapped as
/// a `Stream`.
pub fn message_channel(buffer: usize) -> (mpsc::Sender<TransportResult<JsonRpcMessage>>, MessageStream) {
    let (tx, rx) = mpsc::channel(buffer);
    (tx, Box::pin(ReceiverStream::new(rx)))
}

/// A `take_messages` call made after the channel was already taken (or
/// never created) returns this: an immediately-exhausted stream.
pub fn empty_messages() -> MessageStream {
    Box::pin(tokio_stream::empty())
}

/// Run `op` up to `policy.max_attempts` times, sleeping
/// `policy.delay_for(attempt)` between attempts. Used by the SSE+HTTP
/// transport's write path and reconnect loop.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}
