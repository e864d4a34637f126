//! Cache manager for named on-disk stores
//!
//! Provides a `CacheManager` that resolves store names to directories under an
//! XDG-compliant cache root, and deletes whole stores when a cache has to be
//! invalidated.

use directories::ProjectDirs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

use super::disk::DiskStore;
use super::store::StoreError;

/// Manages the named cache stores kept on disk
///
/// Stores live in `~/.cache/dweb-cache/<store name>/` on Linux. Opening a
/// store does not touch the filesystem; its directory appears with the first
/// entry written to it.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory under which each store gets its own subdirectory
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "dweb-cache")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the directory of the store called `name`
    fn store_dir(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.cache_dir.join(name))
    }

    /// Opens (or lazily creates) the store called `name`
    pub fn open(&self, name: &str) -> Result<DiskStore, StoreError> {
        Ok(DiskStore::new(self.store_dir(name)?))
    }

    /// Deletes the store called `name` with all of its entries
    ///
    /// # Returns
    /// * `Ok(true)` if the store existed and was removed
    /// * `Ok(false)` if there was nothing to remove
    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let dir = self.store_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(store = name, "deleted cache store");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the names of every store that exists on disk
    pub async fn names(&self) -> Result<Vec<String>, StoreError> {
        let mut dir = match fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
