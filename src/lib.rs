//! A Model Context Protocol client runtime: a bidirectional JSON-RPC 2.0
//! endpoint that negotiates a session with an MCP server, multiplexes
//! in-flight requests over a pluggable byte transport, dispatches
//! server-initiated requests and notifications back to application
//! handlers, manages reconnection and health checks, and supervises a
//! fleet of such endpoints on behalf of an application.
//!
//! ```text
//! application -> Host -> Endpoint -> Transport -> wire
//! server -> Transport -> Endpoint (correlate or dispatch) -> application handler / notification stream / Host fan-out
//! ```
//!
//! The crate is organized leaf-first, matching the component table:
//!
//! - [`jsonrpc`] — the wire message union, error object, request id, and
//!   protocol version negotiation (component A).
//! - [`sse`] — the incremental Server-Sent Events line parser (component B).
//! - [`transport`] — the abstract duplex carrier, retry wrapper, and
//!   health-check task (component C), plus the [`transport::stdio`]
//!   (component D) and [`transport::sse_http`] (component E) bindings.
//! - [`mcp`] — the MCP request/response/notification taxonomy and
//!   capability gating layered on the wire model.
//! - [`endpoint`] — a single connected session: state machine, request
//!   multiplexer, progress, and inbound dispatch (component F).
//! - [`progress`] — the progress-token to handler map (component G).
//! - [`host`] — the multi-endpoint supervisor (component H).
//! - [`config`] — the configuration surface (component I).
//!
//! JSON Schema validation of tool `inputSchema` objects, resource MIME-type
//! interpretation, LLM sampling, and session persistence across process
//! restarts are explicitly out of scope; see the crate's specification for
//! the full rationale.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod host;
pub mod jsonrpc;
pub mod mcp;
pub mod progress;
pub mod sse;
pub mod subscriber;
pub mod transport;

pub use config::ClientConfig;
pub use endpoint::{Endpoint, EndpointState};
pub use error::{EndpointError, Result};
pub use host::{ConnectionId, ConnectionRecord, Host, HostError, HostEvent};
pub use jsonrpc::{JsonRpcError, JsonRpcMessage, RequestId};
pub use transport::Transport;
