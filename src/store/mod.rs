mod drive;
mod local;

pub use drive::{DriveConfig, DriveStore};
pub use local::LocalDirStore;

use async_trait::async_trait;

/// Handle to a stored document, assigned by the backend.
///
/// The backend offers no direct name → content addressing, so a handle is
/// looked up by name before every read or write and is only valid until the
/// document is replaced or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
  /// Opaque storage-assigned identifier.
  pub id: String,
  /// Revision token for conditional writes, when the backend exposes one.
  pub revision: Option<String>,
}

/// Document store failure. "Document absent" is not an error: `find_by_name`
/// reports it as `Ok(None)` and that is the only case callers may treat as
/// an empty collection.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// Backend unreachable or answering with a server-side failure.
  #[error("storage backend unavailable: {0}")]
  Unavailable(String),

  /// Backend rejected the store's own credentials.
  #[error("storage backend denied access: {0}")]
  Denied(String),

  /// Deadline exceeded. `outcome_unknown` is set for mutating calls, whose
  /// content may or may not have landed; callers must not report those as a
  /// plain failure.
  #[error("{op} timed out")]
  Timeout {
    op: &'static str,
    outcome_unknown: bool,
  },

  /// Conditional write lost the race (`write_if_revision` only).
  #[error("document was modified concurrently")]
  Conflict,
}

/// A named JSON document in an app-private storage area.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  /// First non-trashed object with the given name in the private namespace,
  /// or `None`. Duplicate names are tolerated: the first match wins.
  async fn find_by_name(&self, name: &str) -> Result<Option<FileHandle>, StoreError>;

  /// Full content of a previously located object.
  async fn read(&self, handle: &FileHandle) -> Result<Vec<u8>, StoreError>;

  /// Create-or-update resolution point: overwrite `existing` in place when a
  /// handle is supplied, otherwise create a new object under `name`.
  async fn write(
    &self,
    name: &str,
    bytes: &[u8],
    existing: Option<&FileHandle>,
  ) -> Result<FileHandle, StoreError>;

  /// Conditional write keyed on `expected.revision`, failing with
  /// [`StoreError::Conflict`] when the stored document moved on.
  ///
  /// Backends without revision preconditions degrade to a plain overwrite,
  /// so callers only get conflict detection where the backend can give it.
  async fn write_if_revision(
    &self,
    name: &str,
    bytes: &[u8],
    expected: &FileHandle,
  ) -> Result<FileHandle, StoreError> {
    self.write(name, bytes, Some(expected)).await
  }
}
