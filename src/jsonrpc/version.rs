//! MCP protocol version negotiation.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The protocol version this crate implements.
pub const CURRENT_VERSION: &str = "2025-03-26";

/// Versions the endpoint will accept from a server, in descending preference
/// order. The first entry is always `CURRENT_VERSION`.
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// A `YYYY-MM-DD` protocol version string.
///
/// Validation requires a real Gregorian calendar date, not merely a
/// character-position match against the `YYYY-MM-DD` shape: `isValidFormat`
/// must reject a string like `2025-02-31` that has the right shape but names
/// a day that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(String);

impl ProtocolVersion {
    pub fn current() -> Self {
        Self(CURRENT_VERSION.to_string())
    }

    /// Parse and validate a version string. Fails unless it is a valid
    /// calendar date in `YYYY-MM-DD` form.
    pub fn parse(version: impl Into<String>) -> Result<Self, InvalidVersionFormat> {
        let version = version.into();
        if is_valid_format(&version) {
            Ok(Self(version))
        } else {
            Err(InvalidVersionFormat(version))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `isSupported(v) ⇒ isValidFormat(v) ∧ v ∈ supportedVersions`.
    pub fn is_supported(&self) -> bool {
        SUPPORTED_VERSIONS.contains(&self.0.as_str())
    }

    pub fn supports_completions(&self) -> bool {
        self.is_supported() && self.0.as_str() == CURRENT_VERSION
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid protocol version format: {0}")]
pub struct InvalidVersionFormat(pub String);

/// `isValidFormat`: a real calendar date shaped `YYYY-MM-DD`.
pub fn is_valid_format(version: &str) -> bool {
    NaiveDate::parse_from_str(version, "%Y-%m-%d").is_ok()
}

/// Pick the best mutually-acceptable version, or fail if the server's
/// proposed version is not in `supportedVersions`.
pub fn negotiate(server_version: &str) -> Result<ProtocolVersion, VersionNegotiationError> {
    let version = ProtocolVersion::parse(server_version)
        .map_err(|_| VersionNegotiationError::Unsupported(server_version.to_string()))?;
    if version.is_supported() {
        Ok(version)
    } else {
        Err(VersionNegotiationError::Unsupported(server_version.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VersionNegotiationError {
    #[error("server proposed unsupported protocol version: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_supported() {
        assert!(ProtocolVersion::current().is_supported());
    }

    #[test]
    fn rejects_invalid_calendar_date() {
        assert!(!is_valid_format("2025-02-31"));
        assert!(ProtocolVersion::parse("2025-02-31").is_err());
    }

    #[test]
    fn accepts_valid_calendar_date_even_if_unsupported() {
        let v = ProtocolVersion::parse("2023-01-01").unwrap();
        assert!(!v.is_supported());
    }

    #[test]
    fn strict_implication_holds() {
        // isSupported(v) => isValidFormat(v) and v in supportedVersions
        for candidate in ["2025-03-26", "2024-11-05", "2025-02-31", "not-a-date", "2023-06-01"] {
            if let Ok(v) = ProtocolVersion::parse(candidate) {
                if v.is_supported() {
                    assert!(is_valid_format(candidate));
                    assert!(SUPPORTED_VERSIONS.contains(&candidate));
                }
            }
        }
    }

    #[test]
    fn negotiate_accepts_supported_version() {
        assert!(negotiate("2024-11-05").is_ok());
    }

    #[test]
    fn negotiate_rejects_unknown_version() {
        assert!(negotiate("1999-01-01").is_err());
        assert!(negotiate("2025-02-31").is_err());
    }
}
