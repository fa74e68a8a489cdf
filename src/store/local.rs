use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{DocumentStore, FileHandle, StoreError};

/// On-disk mirror of the remote store: one file per document name under a
/// single data directory.
///
/// Revision tokens are content hashes, so `write_if_revision` detects
/// concurrent modification for real here.
pub struct LocalDirStore {
  root: PathBuf,
}

impl LocalDirStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Create the data directory if it is missing.
  pub async fn init(&self) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(&self.root).await.map_err(io_err)
  }

  fn path_for(&self, id: &str) -> PathBuf {
    self.root.join(id)
  }

  /// Atomic replace: write a temp file in the same directory, then rename
  /// over the target. Readers see either the old or the new content.
  async fn replace(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
    let target = self.path_for(id);
    let tmp = self.root.join(format!(".{}.{}", id, Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, &target).await {
      let _ = tokio::fs::remove_file(&tmp).await;
      return Err(io_err(e));
    }
    Ok(())
  }
}

#[async_trait]
impl DocumentStore for LocalDirStore {
  async fn find_by_name(&self, name: &str) -> Result<Option<FileHandle>, StoreError> {
    let id = file_name(name);
    match tokio::fs::read(self.path_for(&id)).await {
      Ok(bytes) => Ok(Some(FileHandle {
        id,
        revision: Some(content_revision(&bytes)),
      })),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(io_err(e)),
    }
  }

  async fn read(&self, handle: &FileHandle) -> Result<Vec<u8>, StoreError> {
    // A handle refers to a previously located file; any failure here,
    // including NotFound, means the document vanished under us.
    tokio::fs::read(self.path_for(&handle.id)).await.map_err(io_err)
  }

  async fn write(
    &self,
    name: &str,
    bytes: &[u8],
    existing: Option<&FileHandle>,
  ) -> Result<FileHandle, StoreError> {
    let id = match existing {
      Some(handle) => handle.id.clone(),
      None => file_name(name),
    };
    self.replace(&id, bytes).await?;
    Ok(FileHandle {
      id,
      revision: Some(content_revision(bytes)),
    })
  }

  async fn write_if_revision(
    &self,
    name: &str,
    bytes: &[u8],
    expected: &FileHandle,
  ) -> Result<FileHandle, StoreError> {
    // Check-then-rename leaves a small window; the mirror is single-writer
    // in practice, which keeps it acceptable.
    let current = match tokio::fs::read(self.path_for(&expected.id)).await {
      Ok(bytes) => Some(content_revision(&bytes)),
      Err(e) if e.kind() == ErrorKind::NotFound => None,
      Err(e) => return Err(io_err(e)),
    };
    if current.as_deref() != expected.revision.as_deref() {
      return Err(StoreError::Conflict);
    }
    self.write(name, bytes, Some(expected)).await
  }
}

fn io_err(e: std::io::Error) -> StoreError {
  StoreError::Unavailable(e.to_string())
}

fn content_revision(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  format!("{:x}", hasher.finalize())
}

// Document names come from configuration, not clients, but a path separator
// must still not escape the data directory.
fn file_name(name: &str) -> String {
  name.replace(['/', '\\'], "_")
}
