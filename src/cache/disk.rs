//! On-disk cache store
//!
//! Each entry is one JSON file named after the SHA-256 of its request
//! identity. Writes go to a temporary file that is renamed into place, so a
//! concurrent reader sees either the previous entry or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use super::store::{CacheStore, StoreError};
use crate::data::{RequestKey, StoredResponse};

/// Extension of committed entry files
const ENTRY_EXTENSION: &str = "json";

/// Distinguishes temp files written concurrently by this process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Serialized form of a stored response
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    /// Request identity, kept to detect hash collisions and for listing
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    /// Body bytes, base64-encoded
    body: String,
    received_at: DateTime<Utc>,
}

impl DiskEntry {
    fn from_response(key: &RequestKey, response: StoredResponse) -> Self {
        Self {
            key: key.clone(),
            status: response.status,
            headers: response.headers,
            body: BASE64.encode(&response.body),
            received_at: response.received_at,
        }
    }

    fn into_response(self) -> Option<StoredResponse> {
        let body = BASE64.decode(self.body.as_bytes()).ok()?;
        Some(StoredResponse {
            status: self.status,
            headers: self.headers,
            body: body.into(),
            received_at: self.received_at,
        })
    }
}

/// A named `CacheStore` persisted as files in one directory
///
/// The directory is created lazily by the first `put`.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Opens the store rooted at `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding this store's entries
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.dir.join(format!("{:x}.{}", digest, ENTRY_EXTENSION))
    }

    fn temp_path(&self, entry_path: &Path) -> PathBuf {
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = entry_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir
            .join(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
    }

    /// Reads and decodes the entry at `path`
    ///
    /// Returns `None` for a missing file. A file that cannot be decoded is
    /// treated as missing so the next successful fetch overwrites it.
    async fn read_entry(path: &Path) -> Result<Option<DiskEntry>, StoreError> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed cache entry");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn get(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StoreError> {
        let path = self.entry_path(key);
        let Some(entry) = Self::read_entry(&path).await? else {
            return Ok(None);
        };

        if &entry.key != key {
            tracing::warn!(%key, stored = %entry.key, "cache entry hash collision");
            return Ok(None);
        }

        let response = entry.into_response();
        if response.is_none() {
            tracing::warn!(%key, "ignoring cache entry with malformed body");
        }
        Ok(response)
    }

    async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let entry = DiskEntry::from_response(key, response);
        let json = serde_json::to_vec_pretty(&entry)?;

        let path = self.entry_path(key);
        let temp = self.temp_path(&path);
        fs::write(&temp, json).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(entry) = Self::read_entry(&path).await? {
                keys.push(entry.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
