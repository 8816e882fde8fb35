//! Virtual Module Registry.
//!
//! Maps a synthesized sub-module address (`origin + path + ?...&type=script|template`,
//! without the `v` tag) to generated source. Entries live only in memory. The registry is bounded:
//! once `capacity` is reached the least recently used entry is evicted.
//! Concurrent writers for the same URL are not serialized; the last write wins.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use arcstr::ArcStr;
use lru::LruCache;

/// Sub-module discriminator carried in the `type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualKind {
    Script,
    Template,
}

impl VirtualKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Template => "template",
        }
    }
}

#[derive(Debug)]
pub struct VirtualModuleRegistry {
    entries: Mutex<LruCache<String, ArcStr>>,
}

impl VirtualModuleRegistry {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Insert or overwrite. Returns the previous source if any.
    pub fn register(&self, url: impl Into<String>, source: impl Into<ArcStr>) -> Option<ArcStr> {
        let url = url.into();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(url = %url, "registering virtual module");
        entries.put(url, source.into())
    }

    /// Fetch a module's source, marking it recently used.
    pub fn get(&self, url: &str) -> Option<ArcStr> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.contains(url)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URLs currently registered, most recently used first.
    pub fn urls(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|(url, _)| url.clone()).collect()
    }
}
