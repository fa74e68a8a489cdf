//! Domain operations over the single shared location document.

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::{self, AuthContext};
use crate::geotime;
use crate::store::{DocumentStore, FileHandle, StoreError};
use crate::types::LocationRecord;

/// Fields assigned by the server on every append, stripped from client
/// payloads before the record is built.
const SERVER_FIELDS: [&str; 3] = ["id", "user_id", "timestamp"];

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
  #[error("no location with id {0}")]
  NotFound(String),

  #[error("requester may not delete this location")]
  Forbidden,

  #[error("stored document is not a valid location collection: {0}")]
  Malformed(#[source] serde_json::Error),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Repository over the shared document: every call re-fetches the full
/// collection, mutating calls write the full collection back. One read, at
/// most one write, no partial writes.
///
/// There is no coordination between concurrent cycles: two writers racing on
/// the same document each apply their change to their own snapshot, and the
/// later write silently discards the earlier one (lost update). Callers that
/// need conflict detection can build on
/// [`DocumentStore::write_if_revision`].
pub struct LocationRepository {
  store: Arc<dyn DocumentStore>,
  document_name: String,
}

impl LocationRepository {
  pub fn new(store: Arc<dyn DocumentStore>, document_name: impl Into<String>) -> Self {
    Self {
      store,
      document_name: document_name.into(),
    }
  }

  /// All records in insertion order. An absent document reads as an empty
  /// collection; an unreadable one does not.
  pub async fn list(&self) -> Result<Vec<LocationRecord>, RepoError> {
    Ok(self.load().await?.0)
  }

  /// Append a report. The three server-controlled fields are assigned here
  /// and override anything the client sent; the rest of the payload is
  /// stored verbatim.
  pub async fn append(
    &self,
    mut payload: Map<String, Value>,
    owner_id: &str,
  ) -> Result<LocationRecord, RepoError> {
    let (mut records, handle) = self.load().await?;

    for field in SERVER_FIELDS {
      payload.remove(field);
    }
    let lat = payload.get("lat").and_then(Value::as_f64);
    let lng = payload.get("lng").and_then(Value::as_f64);

    let record = LocationRecord {
      id: Uuid::new_v4().to_string(),
      user_id: owner_id.to_string(),
      timestamp: geotime::local_timestamp(lat, lng),
      fields: payload,
    };

    records.push(record.clone());
    self.save(&records, handle).await?;
    tracing::debug!(id = %record.id, owner = owner_id, "location appended");
    Ok(record)
  }

  /// Remove the record with the given id, subject to the delete gate.
  ///
  /// Existence is checked before permission: `NotFound` only when the id is
  /// truly absent, and `Forbidden` leaves the document untouched.
  pub async fn delete_by_id(
    &self,
    id: &str,
    ctx: &AuthContext,
    admin_principal: Option<&str>,
  ) -> Result<(), RepoError> {
    let (mut records, handle) = self.load().await?;

    let index = records
      .iter()
      .position(|r| r.id == id)
      .ok_or_else(|| RepoError::NotFound(id.to_string()))?;
    if !auth::can_delete(ctx, &records[index].user_id, admin_principal) {
      return Err(RepoError::Forbidden);
    }

    records.remove(index);
    self.save(&records, handle).await?;
    tracing::debug!(id, "location deleted");
    Ok(())
  }

  async fn load(&self) -> Result<(Vec<LocationRecord>, Option<FileHandle>), RepoError> {
    let Some(handle) = self.store.find_by_name(&self.document_name).await? else {
      return Ok((Vec::new(), None));
    };
    let bytes = self.store.read(&handle).await?;
    let records: Vec<LocationRecord> =
      serde_json::from_slice(&bytes).map_err(RepoError::Malformed)?;
    Ok((records, Some(handle)))
  }

  async fn save(
    &self,
    records: &[LocationRecord],
    handle: Option<FileHandle>,
  ) -> Result<FileHandle, RepoError> {
    let bytes = serde_json::to_vec_pretty(records).map_err(RepoError::Malformed)?;
    Ok(
      self
        .store
        .write(&self.document_name, &bytes, handle.as_ref())
        .await?,
    )
  }
}
