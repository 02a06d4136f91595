//! JSON-RPC request identifiers.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A JSON-RPC 2.0 request id.
///
/// The wire allows string or integer ids; this type preserves whichever form
/// it was constructed with so that encode-then-decode round-trips losslessly,
/// and implements `Hash`/`Eq` so it can key the pending-request table and the
/// progress-token map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestId {
    String(String),
    Int(i64),
}

impl RequestId {
    /// Allocate a fresh id for an outbound request (string UUID v4, per the
    /// endpoint's send contract).
    pub fn new_uuid() -> Self {
        Self::String(uuid::Uuid::new_v4().to_string())
    }

    pub fn new_string(id: impl Into<String>) -> Self {
        Self::String(id.into())
    }

    pub fn new_int(id: i64) -> Self {
        Self::Int(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Int(i) => write!(f, "{i}"),
        }
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            RequestId::String(s) => serializer.serialize_str(s),
            RequestId::Int(i) => serializer.serialize_i64(*i),
        }
    }
}

struct RequestIdVisitor;

impl<'de> Visitor<'de> for RequestIdVisitor {
    type Value = RequestId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-RPC request id (string or integer)")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(RequestId::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(RequestId::String(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(RequestId::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        i64::try_from(v)
            .map(RequestId::Int)
            .map_err(|_| E::custom("request id out of i64 range"))
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RequestIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_string_id() {
        let id = RequestId::new_string("abc-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""abc-123""#);
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn round_trips_int_id() {
        let id = RequestId::new_int(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(RequestId::new_string("x").to_string(), "x");
        assert_eq!(RequestId::new_int(7).to_string(), "7");
    }

    #[test]
    fn hashable_for_map_keys() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(RequestId::new_uuid(), "a");
        assert_eq!(map.len(), 1);
    }
}
