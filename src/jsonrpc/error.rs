//! JSON-RPC 2.0 error object and the MCP extension codes layered on top of it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-visible JSON-RPC error object: `{ code, message, data? }`.
///
/// This is the type that travels on an `Error` message and is also what a
/// server-initiated request handler may hand back to reply with a structured
/// failure instead of a generic `internalError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const SERVER_ERROR_MIN: i32 = -32099;
    pub const SERVER_ERROR_MAX: i32 = -32000;

    /// MCP extension: the connection backing this request closed before a
    /// response arrived.
    pub const CONNECTION_CLOSED: i32 = -1;
    /// MCP extension: the request's `sendTimeout` elapsed.
    pub const REQUEST_TIMEOUT: i32 = -2;

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(Self::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: impl AsRef<str>) -> Self {
        Self::new(
            Self::METHOD_NOT_FOUND,
            format!("Method not found: {}", method.as_ref()),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }

    pub fn connection_closed() -> Self {
        Self::new(Self::CONNECTION_CLOSED, "Connection closed")
    }

    pub fn request_timeout(method: impl AsRef<str>) -> Self {
        Self::new(
            Self::REQUEST_TIMEOUT,
            format!("Request timed out: {}", method.as_ref()),
        )
    }

    pub fn cancelled(reason: Option<&str>) -> Self {
        Self::new(
            Self::CONNECTION_CLOSED,
            reason.unwrap_or("Request cancelled").to_string(),
        )
    }

    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_server_error(&self) -> bool {
        (Self::SERVER_ERROR_MIN..=Self::SERVER_ERROR_MAX).contains(&self.code)
    }
}
