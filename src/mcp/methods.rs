//! Request/response shapes for each MCP typed method (§3), plus the
//! per-method dispatch table the endpoint uses to decode `result`/`params`
//! and to gate calls on negotiated capabilities.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capabilities::{ClientCapabilities, ServerCapabilities};
use super::types::{ClientInfo, Content, Root, ServerInfo};
use crate::jsonrpc::ProtocolVersion;

// ---- initialize ----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeParams {
    pub fn new(capabilities: ClientCapabilities, client_info: ClientInfo) -> Self {
        Self {
            protocol_version: ProtocolVersion::current().as_str().to_string(),
            capabilities,
            client_info,
        }
    }
}

// ---- ping ------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PingResult {}

// ---- prompts ---------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListPromptsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListPromptsResult {
    pub prompts: Vec<Prompt>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetPromptResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    pub role: String,
    pub content: Content,
}

// ---- resources --------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListResourcesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResourcesResult {
    pub resources: Vec<ResourceDescriptor>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadResourceResult {
    pub contents: Vec<super::types::ResourceContents>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscribeResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceTemplate {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListResourceTemplatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResourceTemplatesResult {
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// ---- tools --------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListToolsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

// ---- logging --------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetLevelParams {
    pub level: LogLevel,
}

// ---- completion --------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteParams {
    #[serde(rename = "ref")]
    pub reference: Value,
    pub argument: CompleteArgument,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteArgument {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteResult {
    pub completion: CompletionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionInfo {
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

// ---- server -> client --------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListRootsResult {
    pub roots: Vec<Root>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageParams {
    pub messages: Vec<PromptMessage>,
    #[serde(rename = "maxTokens")]
    pub max_tokens: i64,
    #[serde(flatten)]
    pub extra: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageResult {
    pub role: String,
    pub content: Content,
    pub model: String,
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// What an outbound call needs checked against the negotiated server
/// capabilities before a single byte is written to the transport, per the
/// send contract's capability gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityGate {
    Always,
    RequiresPrompts,
    RequiresResources,
    RequiresResourceSubscribe,
    RequiresTools,
    RequiresLogging,
    RequiresCompletions,
}

impl CapabilityGate {
    /// Resolve the gate for a client→server method name.
    pub fn for_method(method: &str) -> Self {
        match method {
            "initialize" | "ping" => CapabilityGate::Always,
            "prompts/list" | "prompts/get" => CapabilityGate::RequiresPrompts,
            "resources/subscribe" | "resources/unsubscribe" => {
                CapabilityGate::RequiresResourceSubscribe
            }
            "resources/list" | "resources/templates/list" | "resources/read" => {
                CapabilityGate::RequiresResources
            }
            "tools/list" | "tools/call" => CapabilityGate::RequiresTools,
            "logging/setLevel" => CapabilityGate::RequiresLogging,
            "completion/complete" => CapabilityGate::RequiresCompletions,
            _ => CapabilityGate::Always,
        }
    }

    pub fn check(
        self,
        caps: &ServerCapabilities,
        negotiated_version: &ProtocolVersion,
    ) -> Result<(), String> {
        let ok = match self {
            CapabilityGate::Always => true,
            CapabilityGate::RequiresPrompts => caps.has_prompts(),
            CapabilityGate::RequiresResources => caps.has_resources(),
            CapabilityGate::RequiresResourceSubscribe => caps.supports_resource_subscribe(),
            CapabilityGate::RequiresTools => caps.has_tools(),
            CapabilityGate::RequiresLogging => caps.has_logging(),
            CapabilityGate::RequiresCompletions => negotiated_version.supports_completions(),
        };
        if ok {
            Ok(())
        } else {
            Err(match self {
                CapabilityGate::RequiresTools => "Server does not support tools.".to_string(),
                CapabilityGate::RequiresResources => {
                    "Server does not support resources.".to_string()
                }
                CapabilityGate::RequiresResourceSubscribe => {
                    "Server does not support resource subscriptions.".to_string()
                }
                CapabilityGate::RequiresPrompts => "Server does not support prompts.".to_string(),
                CapabilityGate::RequiresLogging => "Server does not support logging.".to_string(),
                CapabilityGate::RequiresCompletions => {
                    "Negotiated protocol version does not support completions.".to_string()
                }
                CapabilityGate::Always => unreachable!("Always gate never fails"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_gate_rejects_minimal_capabilities() {
        let gate = CapabilityGate::for_method("tools/list");
        let err = gate
            .check(&ServerCapabilities::minimal(), &ProtocolVersion::current())
            .unwrap_err();
        assert_eq!(err, "Server does not support tools.");
    }

    #[test]
    fn ping_is_always_allowed() {
        let gate = CapabilityGate::for_method("ping");
        assert!(gate
            .check(&ServerCapabilities::minimal(), &ProtocolVersion::current())
            .is_ok());
    }

    #[test]
    fn resource_subscribe_requires_explicit_flag() {
        let caps = ServerCapabilities {
            resources: Some(super::super::capabilities::ResourceCapabilities {
                subscribe: Some(false),
                list_changed: None,
            }),
            ..Default::default()
        };
        let gate = CapabilityGate::for_method("resources/subscribe");
        assert!(gate.check(&caps, &ProtocolVersion::current()).is_err());

        let gate = CapabilityGate::for_method("resources/list");
        assert!(gate.check(&caps, &ProtocolVersion::current()).is_ok());
    }

    #[test]
    fn call_tool_result_decodes() {
        let json = serde_json::json!({
            "content": [{"type": "text", "text": "ok"}],
            "isError": false
        });
        let result: CallToolResult = serde_json::from_value(json).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
    }
}
