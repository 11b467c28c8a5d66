use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag of the default anonymizing overlay.
pub const DEFAULT_NETWORK: &str = "i2p";

/// Names the transport a peer is reachable over.
///
/// Tags compare case-insensitively; they are normalised to lowercase on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NetworkTag(String);

impl NetworkTag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NetworkTag {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK)
    }
}

impl fmt::Display for NetworkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NetworkTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for NetworkTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<NetworkTag> for String {
    fn from(value: NetworkTag) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_normalised() {
        assert_eq!(NetworkTag::new(" I2P "), NetworkTag::default());
        assert_eq!(NetworkTag::from("Tor").as_str(), "tor");
    }

    #[test]
    fn test_tag_serde_is_plain_string() {
        let json = serde_json::to_string(&NetworkTag::new("i2p")).unwrap();
        assert_eq!(json, "\"i2p\"");

        let tag: NetworkTag = serde_json::from_str("\"I2P\"").unwrap();
        assert_eq!(tag, NetworkTag::default());
    }
}
