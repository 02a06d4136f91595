//! MCP request/response/notification taxonomy layered on the JSON-RPC wire
//! model (component A, MCP half).

pub mod capabilities;
pub mod methods;
pub mod notifications;
pub mod types;

pub use capabilities::{ClientCapabilities, ServerCapabilities};
pub use methods::{CapabilityGate, InitializeParams, InitializeResult};
pub use types::{ClientInfo, Content, Root, ServerInfo};
