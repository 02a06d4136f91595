//! Typed shapes for MCP notifications, decoded from
//! [`crate::jsonrpc::JsonRpcNotification`] params by method name.

use serde::{Deserialize, Serialize};

use crate::jsonrpc::RequestId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelledParams {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `message` is present in newer schema revisions but absent in older ones;
/// tolerate its absence regardless of negotiated version rather than failing
/// to decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressParams {
    #[serde(rename = "progressToken")]
    pub progress_token: RequestId,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourcesUpdatedParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogMessageParams {
    pub level: super::methods::LogLevel,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
}

/// Well-known client-facing notification method names.
pub mod method {
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const CANCELLED: &str = "notifications/cancelled";
    pub const PROGRESS: &str = "notifications/progress";
    pub const ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
    pub const MESSAGE: &str = "notifications/message";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_tolerates_missing_message() {
        let json = serde_json::json!({
            "progressToken": "abc",
            "progress": 0.5
        });
        let params: ProgressParams = serde_json::from_value(json).unwrap();
        assert_eq!(params.message, None);
        assert_eq!(params.total, None);
    }

    #[test]
    fn progress_decodes_with_message_present() {
        let json = serde_json::json!({
            "progressToken": "abc",
            "progress": 1.0,
            "total": 1.0,
            "message": "done"
        });
        let params: ProgressParams = serde_json::from_value(json).unwrap();
        assert_eq!(params.message.as_deref(), Some("done"));
    }

    #[test]
    fn cancelled_reason_is_optional() {
        let json = serde_json::json!({ "requestId": "r1" });
        let params: CancelledParams = serde_json::from_value(json).unwrap();
        assert_eq!(params.reason, None);
    }
}
