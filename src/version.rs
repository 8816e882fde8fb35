//! Application version derived from the version manifest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `base + "." + extension`, as published by the version manifest.
///
/// Every versioned generation name embeds exactly this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Version {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The version manifest body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionManifest {
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    #[serde(rename = "extVersion", deserialize_with = "string_or_number")]
    pub ext_version: String,
}

impl VersionManifest {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn version(&self) -> Version {
        Version(format!("{}.{}", self.version, self.ext_version))
    }
}

// Manifests in the wild publish `"extVersion": 3` as often as `"3"`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
