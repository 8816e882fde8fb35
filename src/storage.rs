//! Named cache generations.
//!
//! A [`CacheStorage`] holds any number of generations, each a map from a
//! request identity to a stored response. Generations are created lazily on
//! the first `put` and destroyed wholesale by `delete`.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::exchange::Response;

pub use fs::FsCacheStorage;
pub use memory::MemoryCacheStorage;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every existing generation, oldest first.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Destroy a generation. Returns `false` if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Store `response` under `key`, creating the generation if needed.
    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<(), CacheError>;

    /// Look `key` up in one generation. A missing generation is a miss.
    async fn lookup(&self, name: &str, key: &str) -> Result<Option<Response>, CacheError>;

    /// First match for `key` across all generations, oldest generation first.
    async fn lookup_any(&self, key: &str) -> Result<Option<Response>, CacheError> {
        for name in self.keys().await? {
            if let Some(response) = self.lookup(&name, key).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
