//! # Intercept Loader
//!
//! Client-side interception layer that serves, versions, and compiles source
//! assets on demand. Typed scripts, single-file components, JSON, and
//! stylesheets are turned into plain executable modules before they reach a
//! runtime that only understands those.
//!
//! Every intercepted request is classified exactly once (see [`classify`]) and
//! handled by one strategy: offline passthrough, generation-tagged caching,
//! a synthesized virtual module, or the compilation pipeline.
//!
//! Caching is advisory. Compilation is not: a malformed source produces an
//! [`InterceptError::Compile`], never a silently broken module.

pub mod classify;
pub mod compile;
pub mod config;
pub mod context;
pub mod exchange;
pub mod fetch;
pub mod generations;
pub mod interceptor;
pub mod kv;
pub mod network;
pub mod registry;
pub mod storage;
pub mod version;

use thiserror::Error;

pub use crate::compile::CompileError;
pub use crate::config::InterceptorConfig;
pub use crate::context::WorkerContext;
pub use crate::exchange::{Request, Response};
pub use crate::interceptor::Interceptor;
pub use crate::network::{FetchError, Network};
pub use crate::storage::{CacheError, CacheStorage};
pub use crate::version::Version;

// ---------------------------------------------------------------------------
// InterceptError
// ---------------------------------------------------------------------------

/// Errors surfaced to the caller of the interceptor.
///
/// The caller turns any of these into a failed network response.
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("network error: {0}")]
    Network(#[from] FetchError),

    #[error("failed to compile {url}: {source}")]
    Compile {
        url: String,
        #[source]
        source: CompileError,
    },

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("invalid version manifest: {0}")]
    Manifest(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, InterceptError>;
