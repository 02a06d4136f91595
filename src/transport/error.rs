//! Transport-stratum errors (§7, stratum 2): failures that never travel on
//! the wire, as opposed to [`crate::jsonrpc::JsonRpcError`] which does.

use thiserror::Error;

/// Errors surfaced by transport primitives (`start`, `stop`, `send`, the
/// message stream) and folded by the endpoint into a `Failed` state.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O failure underlying the transport (process spawn, socket, pipe).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `transport.send` did not complete before its deadline.
    #[error("send timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A frame could not be decoded as a `JsonRpcMessage`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The underlying link could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A transport-specific operation failed (HTTP status, process exit).
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// An operation was attempted from a state that does not allow it
    /// (e.g. `send` before `start`, double `start` on a transport that
    /// treats re-entrancy as an error).
    #[error("invalid transport state: {0}")]
    InvalidState(String),

    /// A message exceeded `max_message_size` before being written.
    #[error("message too large: {size} bytes (max {max} bytes)")]
    MessageTooLarge { size: usize, max: usize },

    /// The transport does not support the requested operation (e.g. SSE
    /// endpoint discovery on a transport with no POST URL configured yet).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A discovered URL used a scheme other than the one the SSE endpoint
    /// was reached over.
    #[error("invalid URL scheme: {0}")]
    InvalidUrlScheme(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
