//! Filesystem image store.
//!
//! Persists attachment bytes under a single images directory. Each stored
//! file gets a UUID prefix so user filenames can never collide or escape
//! the directory.

use async_trait::async_trait;
use emberchat_core::error::StoreError;
use emberchat_core::store::ImageStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Stores image attachments as files under one directory.
pub struct FsImageStore {
    dir: PathBuf,
}

impl FsImageStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::ImageWrite(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete files in the images directory that no message references.
    /// Best-effort: individual delete failures are logged and skipped.
    pub fn sweep_orphans(&self, referenced: &[String]) -> Result<usize, StoreError> {
        let referenced: HashSet<&str> = referenced.iter().map(String::as_str).collect();
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| StoreError::Storage(format!("read {}: {e}", self.dir.display())))?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(path_str) = path.to_str() else {
                continue;
            };
            if !referenced.contains(path_str) {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("failed to remove orphaned image {}: {e}", path.display()),
                }
            }
        }
        if removed > 0 {
            debug!(removed, "swept orphaned images");
        }
        Ok(removed)
    }

    fn unique_name(filename: &str) -> String {
        // Keep only the final path component of whatever the user selected
        let base = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image");
        format!("{}_{}", Uuid::new_v4(), base)
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn store_image(&self, bytes: &[u8], filename: &str) -> Result<String, StoreError> {
        let path = self.dir.join(Self::unique_name(filename));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::ImageWrite(format!("write {}: {e}", path.display())))?;
        debug!(path = %path.display(), size = bytes.len(), "stored image");
        Ok(path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_bytes_under_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path()).unwrap();

        let first = store.store_image(b"aaa", "cat.png").await.unwrap();
        let second = store.store_image(b"bbb", "cat.png").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"aaa");
        assert_eq!(std::fs::read(&second).unwrap(), b"bbb");
    }

    #[tokio::test]
    async fn filename_is_sanitized_to_basename() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path()).unwrap();

        let path = store
            .store_image(b"x", "../../etc/passwd.png")
            .await
            .unwrap();
        assert!(Path::new(&path).parent().unwrap() == dir.path());
        assert!(path.ends_with("passwd.png"));
    }

    #[tokio::test]
    async fn sweep_removes_only_unreferenced_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path()).unwrap();

        let kept = store.store_image(b"keep", "keep.png").await.unwrap();
        let _orphan = store.store_image(b"drop", "drop.png").await.unwrap();

        let removed = store.sweep_orphans(&[kept.clone()]).unwrap();
        assert_eq!(removed, 1);
        assert!(Path::new(&kept).exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
