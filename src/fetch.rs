//! Cache-first and offline-fallback fetch strategies.

use tracing::{debug, info, warn};

use crate::context::WorkerContext;
use crate::exchange::{Request, Response};
use crate::network::FetchError;
use crate::version::Version;
use crate::Result;

/// Serve `request` from any generation, otherwise fetch it and keep a copy of
/// a `200` in the versioned generation (or the static one while no version
/// is known).
///
/// Only `GET` responses are stored or looked up.
pub async fn fetch_and_cache(
    ctx: &WorkerContext,
    request: &Request,
    version: Option<&Version>,
) -> Result<Response> {
    let cacheable = request.method == http::Method::GET;

    if cacheable {
        match ctx.storage().lookup_any(request.cache_key()).await {
            Ok(Some(hit)) => {
                debug!(url = %request.url, "cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!(url = %request.url, error = %e, "cache lookup failed, going to network"),
        }
    }

    let response = ctx.network().fetch(request).await?;

    if cacheable && response.is_success() {
        let generation = ctx.names().target(version);
        if let Err(e) = ctx
            .storage()
            .put(&generation, request.cache_key(), &response)
            .await
        {
            warn!(url = %request.url, generation = %generation, error = %e, "failed to cache response");
        }
    }

    Ok(response)
}

/// Network first. A `200` over http(s) replaces the offline snapshot; when
/// the network is unreachable the snapshot is served instead.
pub async fn fetch_and_cache_offline(ctx: &WorkerContext, request: &Request) -> Result<Response> {
    let offline = &ctx.names().offline;

    match ctx.network().fetch(request).await {
        Ok(response) => {
            if response.is_success() && request.is_network_scheme() {
                if let Err(e) = ctx
                    .storage()
                    .put(offline, request.cache_key(), &response)
                    .await
                {
                    warn!(url = %request.url, error = %e, "failed to store offline snapshot");
                }
            }
            Ok(response)
        }
        Err(FetchError::Offline) => {
            let snapshot = match ctx.storage().lookup(offline, request.cache_key()).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(url = %request.url, error = %e, "offline snapshot unreadable");
                    None
                }
            };
            match snapshot {
                Some(response) => {
                    info!(url = %request.url, "network unreachable, serving offline snapshot");
                    Ok(response)
                }
                None => Err(FetchError::Offline.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}
