//! Network seam.
//!
//! The interceptor never talks to a socket directly; it goes through a
//! [`Network`] so that offline behavior can be distinguished from other
//! failures and so hosts can plug in their own transport.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::exchange::{Request, Response};

/// Why a fetch produced no response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The client is offline. Eligible for the offline fallback cache.
    #[error("client is offline")]
    Offline,

    /// Any other transport failure. Always propagates.
    #[error("fetch failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

// ---------------------------------------------------------------------------
// DirectoryNetwork
// ---------------------------------------------------------------------------

/// Serves a local directory as if it were a single origin.
///
/// Requests for other origins fail; missing files produce `404`.
#[derive(Debug)]
pub struct DirectoryNetwork {
    origin: String,
    root: PathBuf,
    online: AtomicBool,
}

impl DirectoryNetwork {
    pub fn new(origin: &url::Url, root: impl Into<PathBuf>) -> Self {
        Self {
            origin: origin.origin().ascii_serialization(),
            root: root.into(),
            online: AtomicBool::new(true),
        }
    }

    /// Toggle simulated connectivity.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn resolve(&self, url: &url::Url) -> Result<PathBuf, FetchError> {
        if url.origin().ascii_serialization() != self.origin {
            return Err(FetchError::Failed(format!(
                "{} is outside origin {}",
                url, self.origin
            )));
        }
        let mut path = self.root.clone();
        let segments = url.path_segments().into_iter().flatten();
        for segment in segments.filter(|s| !s.is_empty()) {
            if segment == ".." || segment.contains('\\') {
                return Err(FetchError::Failed(format!("refusing path {}", url.path())));
            }
            path.push(segment);
        }
        if url.path().ends_with('/') {
            path.push("index.html");
        }
        Ok(path)
    }
}

#[async_trait]
impl Network for DirectoryNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(FetchError::Offline);
        }
        let path = self.resolve(&request.url)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Response::ok(bytes).with_content_type(content_type_for(&path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Response::not_found()),
            Err(e) => Err(FetchError::Failed(format!(
                "failed to read '{}': {e}",
                path.display()
            ))),
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("js" | "mjs") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("html") => "text/html",
        _ => "text/plain",
    }
}
