//! Interceptor configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{InterceptError, Result};

/// Tunables for cache naming, routing namespaces, and the component pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterceptorConfig {
    /// Generation holding the key-value store.
    pub kv_cache: String,
    /// Unversioned, long-lived asset generation.
    pub static_cache: String,
    /// Last-known-good responses for offline use.
    pub offline_cache: String,
    /// Versioned generations are named `versioned_prefix + version`.
    pub versioned_prefix: String,
    /// Version manifest location, relative to the registration scope.
    pub manifest_path: String,
    /// Path prefix served as synthetic builtin-module wrappers.
    pub builtin_namespace: String,
    /// Bare import specifier of the UI framework inside compiled components.
    pub framework_specifier: String,
    /// Local copy of the framework, relative to the anchor base.
    pub framework_local_path: String,
    /// Path segment whose prefix becomes the base for `framework_local_path`.
    pub anchor_segment: String,
    /// URLs (relative to the scope) fetched into the versioned generation at install.
    pub precache: Vec<String>,
    /// Maximum number of virtual modules held in memory.
    pub registry_capacity: usize,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            kv_cache: "SWHelperCache".into(),
            static_cache: "cache-v1-static".into(),
            offline_cache: "cache-v1-offline".into(),
            versioned_prefix: "cache-v1-".into(),
            manifest_path: "version.json".into(),
            builtin_namespace: "/builtin-modules/".into(),
            framework_specifier: "vue".into(),
            framework_local_path: "game/vue.esm-browser.js".into(),
            anchor_segment: "extension".into(),
            precache: Vec::new(),
            registry_capacity: 512,
        }
    }
}

impl InterceptorConfig {
    /// Parse a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| InterceptError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            InterceptError::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        let names = [
            ("kv_cache", &self.kv_cache),
            ("static_cache", &self.static_cache),
            ("offline_cache", &self.offline_cache),
            ("versioned_prefix", &self.versioned_prefix),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(InterceptError::Config(format!("{field} must be non-empty")));
            }
        }
        if !self.builtin_namespace.starts_with('/') {
            return Err(InterceptError::Config(
                "builtin_namespace must start with '/'".into(),
            ));
        }
        if self.registry_capacity == 0 {
            return Err(InterceptError::Config(
                "registry_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
