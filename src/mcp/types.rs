//! Small shared value types referenced across the MCP typed methods.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

pub type ClientInfo = Implementation;
pub type ServerInfo = Implementation;

/// A single root directory the client exposes to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Root {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Content block shared by prompts, tools, and sampling payloads. Resource
/// MIME-type interpretation is explicitly out of scope; the `mime_type`
/// field is stored and forwarded verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: ResourceContents,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceContents {
    pub uri: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_text_round_trips() {
        let c = Content::Text {
            text: "ok".to_string(),
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains(r#""type":"text""#));
        let back: Content = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }

    #[test]
    fn root_name_is_optional() {
        let root = Root {
            uri: "file:///tmp".to_string(),
            name: None,
        };
        let json = serde_json::to_value(&root).unwrap();
        assert!(json.get("name").is_none());
    }
}
