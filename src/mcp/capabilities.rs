//! MCP capability negotiation structures and the derived capability bitset.
//!
//! Capabilities are not themselves a bitset on the wire — they are a nested
//! JSON object exchanged during `initialize`. The bitset described in the
//! data model is a set of membership flags derived from this object, used
//! for pre-flight gating in the endpoint's send contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClientCapabilities {
    pub experimental: Option<serde_json::Value>,
    pub sampling: Option<SamplingCapabilities>,
    pub roots: Option<RootsCapabilities>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServerCapabilities {
    pub experimental: Option<serde_json::Value>,
    pub logging: Option<LoggingCapabilities>,
    pub prompts: Option<PromptCapabilities>,
    pub resources: Option<ResourceCapabilities>,
    pub tools: Option<ToolCapabilities>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceCapabilities {
    pub subscribe: Option<bool>,
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ToolCapabilities {
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PromptCapabilities {
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoggingCapabilities {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SamplingCapabilities {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RootsCapabilities {
    pub list_changed: Option<bool>,
}

impl ClientCapabilities {
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn with_sampling() -> Self {
        Self {
            sampling: Some(SamplingCapabilities::default()),
            ..Default::default()
        }
    }

    pub fn with_roots(list_changed: bool) -> Self {
        Self {
            roots: Some(RootsCapabilities {
                list_changed: Some(list_changed),
            }),
            ..Default::default()
        }
    }
}

impl ServerCapabilities {
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Membership flag: does the negotiated session support `tools/*`.
    pub fn has_tools(&self) -> bool {
        self.tools.is_some()
    }

    /// Membership flag: does the negotiated session support `resources/*`.
    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }

    /// Membership flag: does the server additionally support
    /// `resources/subscribe` and `resources/unsubscribe`.
    pub fn supports_resource_subscribe(&self) -> bool {
        matches!(
            &self.resources,
            Some(ResourceCapabilities {
                subscribe: Some(true),
                ..
            })
        )
    }

    pub fn has_prompts(&self) -> bool {
        self.prompts.is_some()
    }

    pub fn has_logging(&self) -> bool {
        self.logging.is_some()
    }
}

impl ClientCapabilities {
    pub fn has_roots(&self) -> bool {
        self.roots.is_some()
    }

    pub fn has_sampling(&self) -> bool {
        self.sampling.is_some()
    }
}
