//! The JSON-RPC 2.0 wire envelope.
//!
//! Unlike a naive `#[serde(untagged)]` enum (which happily merges a
//! `result`+`error` payload into one ambiguous shape), decoding here
//! classifies a message by field presence per the encoding contract: exactly
//! one of `{id+method}`, `{id+result}`, `{id+error}`, `{method, no id}`.
//! Anything else is a parse error.

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::error::JsonRpcError;
use super::request_id::RequestId;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Error(JsonRpcErrorMessage),
    Notification(JsonRpcNotification),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub id: RequestId,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorMessage {
    pub id: RequestId,
    pub error: JsonRpcError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcMessage {
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request(JsonRpcRequest {
            id,
            method: method.into(),
            params,
        })
    }

    pub fn response(id: RequestId, result: Value) -> Self {
        Self::Response(JsonRpcResponse { id, result })
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self::Error(JsonRpcErrorMessage { id, error })
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification(JsonRpcNotification {
            method: method.into(),
            params,
        })
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.id),
            JsonRpcMessage::Response(r) => Some(&r.id),
            JsonRpcMessage::Error(r) => Some(&r.id),
            JsonRpcMessage::Notification(_) => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => None,
        }
    }

    /// Serialize this message to a single line of JSON with no trailing
    /// newline, used by the stdio transport's newline framing.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        match self {
            JsonRpcMessage::Request(r) => {
                map.serialize_entry("id", &r.id)?;
                map.serialize_entry("method", &r.method)?;
                if let Some(params) = &r.params {
                    map.serialize_entry("params", params)?;
                }
            }
            JsonRpcMessage::Response(r) => {
                map.serialize_entry("id", &r.id)?;
                map.serialize_entry("result", &r.result)?;
            }
            JsonRpcMessage::Error(r) => {
                map.serialize_entry("id", &r.id)?;
                map.serialize_entry("error", &r.error)?;
            }
            JsonRpcMessage::Notification(n) => {
                map.serialize_entry("method", &n.method)?;
                if let Some(params) = &n.params {
                    map.serialize_entry("params", params)?;
                }
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| DeError::custom("JSON-RPC message must be an object"))?;

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(other) => {
                return Err(DeError::custom(format!(
                    "unsupported jsonrpc version: {other}"
                )))
            }
            None => return Err(DeError::custom("missing jsonrpc field")),
        }

        let has_id = obj.contains_key("id");
        let has_method = obj.contains_key("method");
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");

        match (has_id, has_method, has_result, has_error) {
            (true, true, false, false) => {
                let id = take_field(obj, "id")?;
                let method = take_string(obj, "method")?;
                let params = obj.remove("params");
                Ok(JsonRpcMessage::Request(JsonRpcRequest { id, method, params }))
            }
            (true, false, true, false) => {
                let id = take_field(obj, "id")?;
                let result = obj
                    .remove("result")
                    .ok_or_else(|| DeError::custom("missing result"))?;
                Ok(JsonRpcMessage::Response(JsonRpcResponse { id, result }))
            }
            (true, false, false, true) => {
                let id = take_field(obj, "id")?;
                let error = take_field(obj, "error")?;
                Ok(JsonRpcMessage::Error(JsonRpcErrorMessage { id, error }))
            }
            (false, true, false, false) => {
                let method = take_string(obj, "method")?;
                let params = obj.remove("params");
                Ok(JsonRpcMessage::Notification(JsonRpcNotification {
                    method,
                    params,
                }))
            }
            _ => Err(DeError::custom(
                "ambiguous JSON-RPC message: must be exactly one of request, response, error, or notification",
            )),
        }
    }
}

fn take_field<T: for<'de> Deserialize<'de>, E: DeError>(
    obj: &mut serde_json::Map<String, Value>,
    key: &str,
) -> Result<T, E> {
    let raw = obj
        .remove(key)
        .ok_or_else(|| E::custom(format!("missing {key}")))?;
    serde_json::from_value(raw).map_err(|e| E::custom(format!("invalid {key}: {e}")))
}

fn take_string<E: DeError>(
    obj: &mut serde_json::Map<String, Value>,
    key: &str,
) -> Result<String, E> {
    match obj.remove(key) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(E::custom(format!("missing or non-string {key}"))),
    }
}
