//! In-memory cache storage.
//!
//! Generations keep their creation order so `lookup_any` searches them the
//! way a browser cache store does.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::exchange::Response;
use crate::storage::{CacheError, CacheStorage};

type Entries = Arc<DashMap<String, Response>>;

/// Thread-safe, non-durable [`CacheStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    generations: Arc<RwLock<Vec<(String, Entries)>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a generation, `None` if it does not exist.
    pub fn entry_count(&self, name: &str) -> Option<usize> {
        self.generation(name).map(|entries| entries.len())
    }

    fn generation(&self, name: &str) -> Option<Entries> {
        let generations = self.generations.read().unwrap_or_else(PoisonError::into_inner);
        generations
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, entries)| Arc::clone(entries))
    }

    fn open(&self, name: &str) -> Entries {
        if let Some(entries) = self.generation(name) {
            return entries;
        }
        let mut generations = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another writer may have created it between the two locks.
        if let Some((_, entries)) = generations.iter().find(|(existing, _)| existing == name) {
            return Arc::clone(entries);
        }
        let entries: Entries = Arc::new(DashMap::new());
        generations.push((name.to_string(), Arc::clone(&entries)));
        entries
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let generations = self.generations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(generations.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.generation(name).is_some())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut generations = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = generations.len();
        generations.retain(|(existing, _)| existing != name);
        Ok(generations.len() != before)
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<(), CacheError> {
        self.open(name).insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<Response>, CacheError> {
        Ok(self
            .generation(name)
            .and_then(|entries| entries.get(key).map(|entry| entry.value().clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generation_created_lazily() {
        let storage = MemoryCacheStorage::new();
        assert!(!storage.has("static").await.unwrap());
        storage.put("static", "k", &Response::ok("v")).await.unwrap();
        assert!(storage.has("static").await.unwrap());
        assert_eq!(storage.entry_count("static"), Some(1));
    }

    #[tokio::test]
    async fn lookup_missing_generation_is_miss() {
        let storage = MemoryCacheStorage::new();
        assert!(storage.lookup("nope", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let storage = MemoryCacheStorage::new();
        storage.put("a", "k", &Response::ok("v")).await.unwrap();
        assert!(storage.delete("a").await.unwrap());
        assert!(!storage.delete("a").await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_any_follows_creation_order() {
        let storage = MemoryCacheStorage::new();
        storage.put("first", "k", &Response::ok("one")).await.unwrap();
        storage.put("second", "k", &Response::ok("two")).await.unwrap();
        let hit = storage.lookup_any("k").await.unwrap().unwrap();
        assert_eq!(hit.text(), "one");
        assert_eq!(storage.keys().await.unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn put_overwrites() {
        let storage = MemoryCacheStorage::new();
        storage.put("a", "k", &Response::ok("old")).await.unwrap();
        storage.put("a", "k", &Response::ok("new")).await.unwrap();
        let hit = storage.lookup("a", "k").await.unwrap().unwrap();
        assert_eq!(hit.text(), "new");
    }
}
