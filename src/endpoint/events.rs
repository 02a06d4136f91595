//! Endpoint-level observable events (§9, "Observable object for connection
//! state"): connection-state changes and forwarded notifications, each
//! exposed as its own broadcast stream so a slow consumer of one does not
//! starve the other.

use serde_json::Value;

use super::state::EndpointState;
use crate::mcp::notifications::{LogMessageParams, ResourcesUpdatedParams};

/// Emitted whenever the endpoint's lifecycle state changes.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointEvent {
    pub state: EndpointState,
}

/// Server-originated notifications the application can observe, after the
/// message pump has consumed the ones it owns internally
/// (`notifications/cancelled`, `notifications/progress`) per §4.6.
#[derive(Debug, Clone, PartialEq)]
pub enum McpNotification {
    RootsListChanged,
    ResourcesListChanged,
    PromptsListChanged,
    ToolsListChanged,
    ResourcesUpdated(ResourcesUpdatedParams),
    Message(LogMessageParams),
    /// A notification method this endpoint does not specially interpret;
    /// preserved and surfaced verbatim (§4.1, "unknown methods on inbound
    /// notifications are preserved").
    Other { method: String, params: Option<Value> },
}

impl McpNotification {
    pub fn method_name(&self) -> &str {
        match self {
            McpNotification::RootsListChanged => {
                crate::mcp::notifications::method::ROOTS_LIST_CHANGED
            }
            McpNotification::ResourcesListChanged => {
                crate::mcp::notifications::method::RESOURCES_LIST_CHANGED
            }
            McpNotification::PromptsListChanged => {
                crate::mcp::notifications::method::PROMPTS_LIST_CHANGED
            }
            McpNotification::ToolsListChanged => {
                crate::mcp::notifications::method::TOOLS_LIST_CHANGED
            }
            McpNotification::ResourcesUpdated(_) => {
                crate::mcp::notifications::method::RESOURCES_UPDATED
            }
            McpNotification::Message(_) => crate::mcp::notifications::method::MESSAGE,
            McpNotification::Other { method, .. } => method,
        }
    }
}
