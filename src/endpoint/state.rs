//! Endpoint lifecycle state (§3, §4.6).

use crate::mcp::methods::InitializeResult;

/// `{ Disconnected, Connecting, Initializing, Running(sessionInfo), Failed(error) }`,
/// per the data model. Ordered lifecycle; see §4.6 for transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointState {
    Disconnected,
    Connecting,
    Initializing,
    Running(SessionInfo),
    Failed(String),
}

impl EndpointState {
    pub fn is_running(&self) -> bool {
        matches!(self, EndpointState::Running(_))
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, EndpointState::Failed(_))
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        match self {
            EndpointState::Running(session) => Some(session),
            _ => None,
        }
    }

    /// Short label for structured logging.
    pub fn label(&self) -> &'static str {
        match self {
            EndpointState::Disconnected => "disconnected",
            EndpointState::Connecting => "connecting",
            EndpointState::Initializing => "initializing",
            EndpointState::Running(_) => "running",
            EndpointState::Failed(_) => "failed",
        }
    }
}

/// The `initialize` response, immutable for the lifetime of a `Running`
/// state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub negotiated_version: crate::jsonrpc::ProtocolVersion,
    pub initialize_result: InitializeResult,
}

impl SessionInfo {
    pub fn server_capabilities(&self) -> &crate::mcp::ServerCapabilities {
        &self.initialize_result.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_carries_a_session() {
        assert!(EndpointState::Disconnected.session().is_none());
        assert!(EndpointState::Failed("x".to_string()).session().is_none());
    }
}
