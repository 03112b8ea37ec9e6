//! Binary object store — screenshot payloads live here, records in Postgres.
//!
//! ARCHITECTURE
//! ============
//! `ObjectStore` is the seam between record persistence and blob storage.
//! Paths are logical (`workspaces/{workspace_id}/screenshots/{user_id}.jpg`)
//! and the store maps them to its own layout. The production implementation
//! writes to a local directory served read-only under `/media`; tests swap
//! in an in-memory store.
//!
//! TRADE-OFFS
//! ==========
//! Writes overwrite in place, so a crash mid-write can leave a torn object.
//! Records are only written after the blob write returns, and the orphan
//! sweep removes blobs that never got a record, so a torn object is never
//! referenced.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use wire::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_STORAGE_IO",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

/// A stored object as seen by the sweep: its logical path and modify time.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub path: String,
    pub modified_at_ms: i64,
}

/// Blob storage operations needed by the screenshot workflow.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any previous object at the same path.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// List stored objects under a logical prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    /// Public URL under which the object is served.
    fn url(&self, path: &str) -> String;
}

/// Prefix every screenshot blob lives under. The sweep lists this prefix.
pub const SCREENSHOT_PREFIX: &str = "workspaces";

/// Logical path of a workspace screenshot. One object per uploader, so a
/// re-upload lands on the same path and replaces the previous image.
#[must_use]
pub fn screenshot_path(workspace_id: Uuid, user_id: Uuid) -> String {
    format!("{SCREENSHOT_PREFIX}/{workspace_id}/screenshots/{user_id}.jpg")
}

/// Parse a logical screenshot path back into `(workspace_id, user_id)`.
/// Returns `None` for anything that does not match the screenshot layout.
#[must_use]
pub fn parse_screenshot_path(path: &str) -> Option<(Uuid, Uuid)> {
    let mut parts = path.split('/');
    if parts.next() != Some(SCREENSHOT_PREFIX) {
        return None;
    }
    let workspace_id: Uuid = parts.next()?.parse().ok()?;
    if parts.next() != Some("screenshots") {
        return None;
    }
    let file = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let user_id: Uuid = file.strip_suffix(".jpg")?.parse().ok()?;
    Some((workspace_id, user_id))
}

// =============================================================================
// FILESYSTEM STORE
// =============================================================================

/// Local-directory object store, served by the HTTP layer under `/media`.
pub struct FsStore {
    root: PathBuf,
    public_base: String,
}

impl FsStore {
    #[must_use]
    pub fn new(root: PathBuf, public_base: impl Into<String>) -> Self {
        Self { root, public_base: public_base.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let base = self.resolve(prefix);
        let mut found = Vec::new();
        let mut pending = vec![base];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(entry.path());
                } else {
                    let Some(path) = logical_path(&self.root, &entry.path()) else {
                        continue;
                    };
                    found.push(StoredObject { path, modified_at_ms: modified_ms(&meta) });
                }
            }
        }

        Ok(found)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.public_base)
    }
}

/// Relative logical path of a file under the store root, `/`-separated.
fn logical_path(root: &Path, full: &Path) -> Option<String> {
    let rel = full.strip_prefix(root).ok()?;
    let mut out = String::new();
    for part in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part.as_os_str().to_str()?);
    }
    Some(out)
}

fn modified_ms(meta: &std::fs::Metadata) -> i64 {
    let Ok(modified) = meta.modified() else {
        return 0;
    };
    let Ok(dur) = modified.duration_since(std::time::UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
