//! Durable key-value store backed by a dedicated cache generation.
//!
//! Keys are addressed as synthetic `https://LOCALCACHE/<encoded key>` URLs so
//! the generation primitive can hold them next to ordinary responses.

use std::sync::Arc;

use bytes::Bytes;

use crate::exchange::Response;
use crate::storage::{CacheError, CacheStorage};

/// KV key holding the last persisted version.
pub const VERSION_KEY: &str = "version";
/// KV key holding the last observed registration root URL.
pub const ROOT_URL_KEY: &str = "rootUrl";

const KEY_ORIGIN: &str = "https://LOCALCACHE/";

#[derive(Clone)]
pub struct KvStore {
    storage: Arc<dyn CacheStorage>,
    generation: String,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("generation", &self.generation)
            .finish()
    }
}

impl KvStore {
    pub fn new(storage: Arc<dyn CacheStorage>, generation: impl Into<String>) -> Self {
        Self {
            storage,
            generation: generation.into(),
        }
    }

    /// Synthetic URL under which `key` is stored.
    pub fn key_url(key: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        format!("{KEY_ORIGIN}{encoded}")
    }

    /// Read `key` as text. Missing keys and read failures both yield `None`.
    pub async fn read(&self, key: &str) -> Option<String> {
        self.read_binary(key)
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read `key` as raw bytes. Missing keys and read failures both yield `None`.
    pub async fn read_binary(&self, key: &str) -> Option<Bytes> {
        match self.storage.lookup(&self.generation, &Self::key_url(key)).await {
            Ok(hit) => hit.map(|response| response.body),
            Err(e) => {
                tracing::debug!(key, error = %e, "kv read failed, treating as miss");
                None
            }
        }
    }

    /// Persist `value` under `key`. Failures are returned to the caller.
    pub async fn write(&self, key: &str, value: impl Into<Bytes>) -> Result<(), CacheError> {
        self.storage
            .put(&self.generation, &Self::key_url(key), &Response::ok(value))
            .await
    }
}
