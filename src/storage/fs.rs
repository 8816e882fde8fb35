//! Durable cache storage on the local filesystem.
//!
//! Layout: `<root>/<hex(generation name)>/<sha256(key)>.{json,body}`.
//! The metadata file is written last, so an entry without one is treated as
//! absent. Each generation directory also holds a `created` stamp that keeps
//! `keys()` in creation order.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::exchange::Response;
use crate::storage::{CacheError, CacheStorage};

const CREATED_MARKER: &str = "created";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
}

/// [`CacheStorage`] persisted under a root directory.
#[derive(Debug, Clone)]
pub struct FsCacheStorage {
    root: PathBuf,
    last_stamp: Arc<AtomicI64>,
}

impl FsCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_stamp: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Wall-clock nanoseconds, strictly increasing across calls on this handle.
    fn next_stamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    fn generation_dir(&self, name: &str) -> PathBuf {
        self.root.join(hex::encode(name))
    }

    fn entry_paths(&self, name: &str, key: &str) -> (PathBuf, PathBuf) {
        let stem = hex::encode(Sha256::digest(key.as_bytes()));
        let dir = self.generation_dir(name);
        (
            dir.join(format!("{stem}.json")),
            dir.join(format!("{stem}.body")),
        )
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut found = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let raw = entry.file_name();
            let Some(encoded) = raw.to_str() else {
                continue;
            };
            // Foreign directories under the root are not generations.
            if let Some(name) = hex::decode(encoded)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                // Unstamped generations sort last.
                let stamp = tokio::fs::read_to_string(entry.path().join(CREATED_MARKER))
                    .await
                    .ok()
                    .and_then(|text| text.trim().parse::<i64>().ok())
                    .unwrap_or(i64::MAX);
                found.push((stamp, name));
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        match tokio::fs::metadata(self.generation_dir(name)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        match tokio::fs::remove_dir_all(self.generation_dir(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<(), CacheError> {
        let dir = self.generation_dir(name);
        tokio::fs::create_dir_all(&self.root).await?;
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {
                tokio::fs::write(dir.join(CREATED_MARKER), self.next_stamp().to_string()).await?
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
        let (meta_path, body_path) = self.entry_paths(name, key);

        let headers = response
            .headers
            .iter()
            .filter_map(|(header, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (header.as_str().to_string(), value.to_string()))
            })
            .collect();
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status.as_u16(),
            headers,
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| CacheError::Corrupt(format!("failed to encode entry: {e}")))?;

        tokio::fs::write(&body_path, &response.body).await?;
        tokio::fs::write(&meta_path, meta_json).await?;
        Ok(())
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<Response>, CacheError> {
        let (meta_path, body_path) = self.entry_paths(name, key);
        let meta_json = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta_json)
            .map_err(|e| CacheError::Corrupt(format!("{}: {e}", meta_path.display())))?;
        if meta.key != key {
            return Ok(None);
        }

        let body = tokio::fs::read(&body_path).await?;
        let status = StatusCode::from_u16(meta.status)
            .map_err(|e| CacheError::Corrupt(format!("{}: {e}", meta_path.display())))?;
        let mut headers = HeaderMap::new();
        for (name, value) in meta.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CacheError::Corrupt(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| CacheError::Corrupt(format!("header value '{value}': {e}")))?;
            headers.append(name, value);
        }

        Ok(Some(Response {
            status,
            headers,
            body: Bytes::from(body),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let response = Response::javascript("export default 1");
        FsCacheStorage::new(dir.path())
            .put("cache-v1-1.0.0", "https://app.test/a.ts?v=1.0.0", &response)
            .await
            .unwrap();

        let reopened = FsCacheStorage::new(dir.path());
        let hit = reopened
            .lookup("cache-v1-1.0.0", "https://app.test/a.ts?v=1.0.0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit, response);
    }

    #[tokio::test]
    async fn keys_lists_decoded_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsCacheStorage::new(dir.path());
        assert!(storage.keys().await.unwrap().is_empty());
        storage.put("cache-v1-static", "k", &Response::ok("a")).await.unwrap();
        storage.put("SWHelperCache", "k", &Response::ok("b")).await.unwrap();
        std::fs::create_dir(dir.path().join("not-hex")).unwrap();
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["cache-v1-static", "SWHelperCache"]
        );
    }

    #[tokio::test]
    async fn keys_keep_creation_order_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsCacheStorage::new(dir.path());
        for name in ["zeta", "alpha", "mid"] {
            storage.put(name, "k", &Response::ok("x")).await.unwrap();
        }
        // Writing into an existing generation does not move it.
        storage.put("zeta", "k2", &Response::ok("y")).await.unwrap();

        let reopened = FsCacheStorage::new(dir.path());
        assert_eq!(reopened.keys().await.unwrap(), vec!["zeta", "alpha", "mid"]);

        reopened.delete("zeta").await.unwrap();
        reopened.put("zeta", "k", &Response::ok("z")).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn lookup_any_prefers_older_generation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsCacheStorage::new(dir.path());
        storage.put("zz-old", "k", &Response::ok("old")).await.unwrap();
        storage.put("aa-new", "k", &Response::ok("new")).await.unwrap();
        assert_eq!(storage.lookup_any("k").await.unwrap().unwrap().text(), "old");
    }

    #[tokio::test]
    async fn delete_removes_generation() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsCacheStorage::new(dir.path());
        storage.put("old", "k", &Response::ok("a")).await.unwrap();
        assert!(storage.delete("old").await.unwrap());
        assert!(!storage.has("old").await.unwrap());
        assert!(!storage.delete("old").await.unwrap());
        assert!(storage.lookup("old", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_any_searches_all_generations() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsCacheStorage::new(dir.path());
        storage.put("b-gen", "k", &Response::ok("hit")).await.unwrap();
        let hit = storage.lookup_any("k").await.unwrap().unwrap();
        assert_eq!(hit.text(), "hit");
        assert!(storage.lookup_any("other").await.unwrap().is_none());
    }
}
