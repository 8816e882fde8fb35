//! Cache generation naming, version resolution and sweeping.
//!
//! A generation survives a sweep only when it is on the whitelist for the
//! current version: the KV store, the static and offline generations, and
//! `versioned_prefix + version`. Everything else is deleted.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::InterceptorConfig;
use crate::context::WorkerContext;
use crate::exchange::{CacheMode, Request};
use crate::fetch::fetch_and_cache_offline;
use crate::kv::VERSION_KEY;
use crate::version::{Version, VersionManifest};
use crate::{InterceptError, Result};

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub kv: String,
    pub static_assets: String,
    pub offline: String,
    pub versioned_prefix: String,
}

impl CacheNames {
    pub fn from_config(config: &InterceptorConfig) -> Self {
        Self {
            kv: config.kv_cache.clone(),
            static_assets: config.static_cache.clone(),
            offline: config.offline_cache.clone(),
            versioned_prefix: config.versioned_prefix.clone(),
        }
    }

    pub fn versioned(&self, version: &Version) -> String {
        format!("{}{}", self.versioned_prefix, version)
    }

    /// Generation a fetched asset is stored in.
    pub fn target(&self, version: Option<&Version>) -> String {
        match version {
            Some(version) => self.versioned(version),
            None => self.static_assets.clone(),
        }
    }

    pub fn whitelist(&self, version: &Version) -> Vec<String> {
        vec![
            self.kv.clone(),
            self.static_assets.clone(),
            self.offline.clone(),
            self.versioned(version),
        ]
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Delete every generation not whitelisted for `version`, in parallel.
/// Returns the names actually deleted; failures are logged and skipped.
pub async fn sweep(ctx: &WorkerContext, version: &Version) -> Vec<String> {
    let whitelist = ctx.names().whitelist(version);
    let existing = match ctx.storage().keys().await {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "cannot list cache generations, skipping sweep");
            return Vec::new();
        }
    };

    let doomed: Vec<String> = existing
        .into_iter()
        .filter(|name| !whitelist.contains(name))
        .collect();
    if doomed.is_empty() {
        debug!(version = %version, "nothing to sweep");
        return Vec::new();
    }

    let results = join_all(doomed.iter().map(|name| async move {
        (name, ctx.storage().delete(name).await)
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(name, result)| match result {
            Ok(true) => {
                info!(generation = %name, "deleted stale cache generation");
                Some(name.clone())
            }
            Ok(false) => None,
            Err(e) => {
                warn!(generation = %name, error = %e, "failed to delete cache generation");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Version resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub version: Version,
    /// Version persisted in the KV store before this check.
    pub previous: Option<Version>,
    pub deleted: Vec<String>,
}

impl VersionCheck {
    pub fn changed(&self) -> bool {
        self.previous.as_ref() != Some(&self.version)
    }
}

/// Fetch the manifest (bypassing HTTP caches, with offline fallback), adopt
/// the computed version, and sweep when it differs from the persisted one.
pub async fn resolve_version(ctx: &WorkerContext) -> Result<VersionCheck> {
    let manifest_url = ctx.scope().join(&ctx.config().manifest_path)?;
    let request = Request::get(manifest_url).with_cache(CacheMode::NoStore);

    let response = fetch_and_cache_offline(ctx, &request).await?;
    if !response.is_success() {
        return Err(InterceptError::Manifest(format!(
            "{} answered {}",
            request.url, response.status
        )));
    }
    let manifest = VersionManifest::from_slice(&response.body)
        .map_err(|e| InterceptError::Manifest(e.to_string()))?;
    let version = manifest.version();
    ctx.set_version(version.clone());

    let previous = ctx.kv().read(VERSION_KEY).await.map(Version::from);
    let deleted = if previous.as_ref() == Some(&version) {
        debug!(version = %version, "version unchanged");
        Vec::new()
    } else {
        info!(
            from = previous.as_ref().map(Version::as_str).unwrap_or("<none>"),
            to = %version,
            "version changed"
        );
        sweep(ctx, &version).await
    };

    if let Err(e) = ctx.kv().write(VERSION_KEY, version.as_str().to_owned()).await {
        warn!(error = %e, "failed to persist version");
    }

    Ok(VersionCheck {
        version,
        previous,
        deleted,
    })
}

/// The in-memory version, resolving it only when none is known yet.
pub async fn check_version(ctx: &WorkerContext) -> Result<Version> {
    match ctx.current_version() {
        Some(version) => Ok(version),
        None => resolve_version(ctx).await.map(|check| check.version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn names_follow_config() {
        let names = CacheNames::from_config(&InterceptorConfig::default());
        let version = Version::new("1.2.3");
        assert_eq!(names.versioned(&version), "cache-v1-1.2.3");
        assert_eq!(names.target(Some(&version)), "cache-v1-1.2.3");
        assert_eq!(names.target(None), "cache-v1-static");
        assert_eq!(
            names.whitelist(&version),
            vec![
                "SWHelperCache".to_string(),
                "cache-v1-static".to_string(),
                "cache-v1-offline".to_string(),
                "cache-v1-1.2.3".to_string(),
            ]
        );
    }

    #[test]
    fn first_check_counts_as_change() {
        let check = VersionCheck {
            version: Version::new("1.0.0"),
            previous: None,
            deleted: Vec::new(),
        };
        assert!(check.changed());
    }
}
