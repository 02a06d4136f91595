//! JSON-RPC 2.0 wire model (component A): the message union, error object,
//! request id, and protocol version negotiation shared by every transport.

mod error;
mod message;
mod request_id;
mod version;

pub use error::JsonRpcError;
pub use message::{
    JsonRpcErrorMessage, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
pub use request_id::RequestId;
pub use version::{
    negotiate, ProtocolVersion, VersionNegotiationError, CURRENT_VERSION, SUPPORTED_VERSIONS,
};

/// Default cap on a single encoded message, per the wire protocol contract.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
