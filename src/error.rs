//! Endpoint-stratum errors (§7): the caller-visible `Result` returned by
//! [`crate::endpoint::Endpoint::send`] and friends.
//!
//! This sits above the two wire-level strata. A [`crate::jsonrpc::JsonRpcError`]
//! arrived on the wire (or is about to be sent on it); a
//! [`crate::transport::TransportError`] never does. `EndpointError` folds
//! both in, plus the purely local outcomes (`timeout`, `cancelled`,
//! `invalidState`, a capability-gate rejection) that never reach the wire
//! either.

use thiserror::Error;

use crate::jsonrpc::JsonRpcError;
use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, EndpointError>;

#[derive(Debug, Error)]
pub enum EndpointError {
    /// The server replied with a JSON-RPC error object.
    #[error(transparent)]
    Protocol(#[from] JsonRpcError),

    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `send` was called while the endpoint was not `Running`.
    #[error("endpoint is not running: {0}")]
    InvalidState(String),

    /// The capability gate for this method rejected the call before a byte
    /// was written.
    #[error("{0}")]
    CapabilityDenied(String),

    /// `sendTimeout` elapsed before a response arrived.
    #[error("request timed out: {method}")]
    Timeout { method: String },

    /// The caller (or the server, via `notifications/cancelled`) cancelled
    /// the request before it completed.
    #[error("request cancelled: {reason}")]
    Cancelled { reason: String },

    /// The connection closed before a response arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// A response arrived whose `result` could not be decoded into the
    /// expected response type.
    #[error("invalid response for {method}: {reason}")]
    InvalidResponse { method: String, reason: String },

    /// The server proposed a protocol version outside `supportedVersions`.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Failed to encode outbound params.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EndpointError {
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState(state.into())
    }

    pub fn timeout(method: impl Into<String>) -> Self {
        Self::Timeout {
            method: method.into(),
        }
    }

    pub fn cancelled(reason: Option<&str>) -> Self {
        Self::Cancelled {
            reason: reason.unwrap_or("cancelled").to_string(),
        }
    }

    pub fn invalid_response(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Render as a wire-visible [`JsonRpcError`], used when an endpoint
    /// that caused this error must itself reply to a peer (not applicable
    /// to outbound `send` failures, but shared by request-handler
    /// dispatch).
    pub fn into_jsonrpc_error(self) -> JsonRpcError {
        match self {
            EndpointError::Protocol(err) => err,
            EndpointError::Timeout { method } => JsonRpcError::request_timeout(method),
            EndpointError::Cancelled { reason } => JsonRpcError::cancelled(Some(&reason)),
            EndpointError::ConnectionClosed => JsonRpcError::connection_closed(),
            EndpointError::CapabilityDenied(message) => JsonRpcError::invalid_request(message),
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_renders_as_request_timeout_code() {
        let err = EndpointError::timeout("tools/call").into_jsonrpc_error();
        assert_eq!(err.code, JsonRpcError::REQUEST_TIMEOUT);
    }

    #[test]
    fn capability_denied_renders_as_invalid_request() {
        let err = EndpointError::CapabilityDenied("Server does not support tools.".to_string())
            .into_jsonrpc_error();
        assert_eq!(err.code, JsonRpcError::INVALID_REQUEST);
    }
}
