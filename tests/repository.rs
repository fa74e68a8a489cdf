//! Repository behavior over the shared location document.

use std::collections::HashSet;
use std::sync::Arc;

use geopin::auth::AuthContext;
use geopin::repo::{LocationRepository, RepoError};
use geopin::store::{DocumentStore, LocalDirStore, StoreError};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

const DOC: &str = "locations.json";

fn payload(value: Value) -> Map<String, Value> {
  value.as_object().cloned().unwrap()
}

fn ctx(principal: &str) -> AuthContext {
  AuthContext {
    principal: Some(principal.to_string()),
  }
}

async fn setup() -> (TempDir, Arc<LocalDirStore>, LocationRepository) {
  let dir = tempfile::tempdir().unwrap();
  let store = Arc::new(LocalDirStore::new(dir.path()));
  store.init().await.unwrap();
  let repo = LocationRepository::new(store.clone(), DOC);
  (dir, store, repo)
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_is_empty_when_document_absent() {
  let (_dir, _store, repo) = setup().await;
  assert!(repo.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_is_idempotent() {
  let (_dir, _store, repo) = setup().await;
  repo
    .append(payload(json!({"lat": 35.68, "lng": 139.76})), "u1")
    .await
    .unwrap();

  let first = repo.list().await.unwrap();
  let second = repo.list().await.unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn test_malformed_document_is_an_error_not_empty() {
  let (_dir, store, repo) = setup().await;
  store.write(DOC, b"not json at all", None).await.unwrap();

  let err = repo.list().await.unwrap_err();
  assert!(matches!(err, RepoError::Malformed(_)));
}

// =============================================================================
// Append
// =============================================================================

#[tokio::test]
async fn test_append_round_trip() {
  let (_dir, _store, repo) = setup().await;
  let record = repo
    .append(
      payload(json!({"lat": 35.68, "lng": 139.76, "note": "bear"})),
      "u1",
    )
    .await
    .unwrap();

  let listed = repo.list().await.unwrap();
  assert_eq!(listed, vec![record.clone()]);
  assert_eq!(record.user_id, "u1");
  assert_eq!(record.fields["note"], "bear");
  assert!(!record.id.is_empty());
}

#[tokio::test]
async fn test_append_overrides_server_controlled_fields() {
  let (_dir, _store, repo) = setup().await;
  let record = repo
    .append(
      payload(json!({
        "id": "forged-id",
        "user_id": "someone-else",
        "timestamp": "forged",
        "lat": 35.68,
        "lng": 139.76
      })),
      "u1",
    )
    .await
    .unwrap();

  assert_ne!(record.id, "forged-id");
  assert_eq!(record.user_id, "u1");
  assert_ne!(record.timestamp, "forged");
  // The forged values are gone entirely, not just shadowed.
  assert!(!record.fields.contains_key("id"));
  assert!(!record.fields.contains_key("user_id"));
  assert!(!record.fields.contains_key("timestamp"));
}

#[tokio::test]
async fn test_append_ids_are_unique() {
  let (_dir, _store, repo) = setup().await;
  let mut ids = HashSet::new();
  for i in 0..10 {
    let record = repo
      .append(payload(json!({"lat": 35.0, "lng": 139.0, "n": i})), "u1")
      .await
      .unwrap();
    ids.insert(record.id);
  }
  assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_sequential_appends_are_all_visible() {
  let (_dir, _store, repo) = setup().await;
  repo.append(payload(json!({"lat": 1.0, "lng": 2.0})), "u1").await.unwrap();
  repo.append(payload(json!({"lat": 3.0, "lng": 4.0})), "u2").await.unwrap();

  assert_eq!(repo.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_tokyo_scenario() {
  let (_dir, _store, repo) = setup().await;
  let record = repo
    .append(payload(json!({"lat": 35.68, "lng": 139.76})), "u1")
    .await
    .unwrap();

  assert_eq!(record.user_id, "u1");

  let pattern =
    regex::Regex::new(r"^(\d{4})年(\d{2})月(\d{2})日 (\d{2})時(\d{2})分(\d{2})秒$").unwrap();
  let caps = pattern.captures(&record.timestamp).expect("timestamp shape");

  // The rendered instant must be Tokyo-local: compare against Tokyo "now"
  // with a generous margin.
  let parsed = chrono::NaiveDate::from_ymd_opt(
    caps[1].parse().unwrap(),
    caps[2].parse().unwrap(),
    caps[3].parse().unwrap(),
  )
  .unwrap()
  .and_hms_opt(
    caps[4].parse().unwrap(),
    caps[5].parse().unwrap(),
    caps[6].parse().unwrap(),
  )
  .unwrap();
  let tokyo_now = chrono::Utc::now()
    .with_timezone(&chrono_tz::Asia::Tokyo)
    .naive_local();
  let drift = (tokyo_now - parsed).num_seconds().abs();
  assert!(drift < 120, "timestamp {} drifts {}s from Tokyo time", record.timestamp, drift);

  assert_eq!(repo.list().await.unwrap(), vec![record]);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_by_owner() {
  let (_dir, _store, repo) = setup().await;
  let record = repo
    .append(payload(json!({"lat": 1.0, "lng": 2.0})), "u1")
    .await
    .unwrap();

  repo.delete_by_id(&record.id, &ctx("u1"), None).await.unwrap();
  assert!(repo.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_by_non_owner_is_forbidden_and_writes_nothing() {
  let (_dir, store, repo) = setup().await;
  let record = repo
    .append(payload(json!({"lat": 1.0, "lng": 2.0})), "u1")
    .await
    .unwrap();
  let before = store.find_by_name(DOC).await.unwrap().unwrap();

  let err = repo
    .delete_by_id(&record.id, &ctx("u2"), None)
    .await
    .unwrap_err();
  assert!(matches!(err, RepoError::Forbidden));

  // Unchanged on disk, not merely re-written with the same content.
  let after = store.find_by_name(DOC).await.unwrap().unwrap();
  assert_eq!(before.revision, after.revision);
  assert_eq!(repo.list().await.unwrap(), vec![record]);
}

#[tokio::test]
async fn test_admin_deletes_regardless_of_ownership() {
  let (_dir, _store, repo) = setup().await;
  let record = repo
    .append(payload(json!({"lat": 1.0, "lng": 2.0})), "u1")
    .await
    .unwrap();

  repo
    .delete_by_id(&record.id, &ctx("admin-1"), Some("admin-1"))
    .await
    .unwrap();
  assert!(repo.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_id_is_not_found() {
  let (_dir, _store, repo) = setup().await;
  let record = repo
    .append(payload(json!({"lat": 1.0, "lng": 2.0})), "u1")
    .await
    .unwrap();

  let err = repo
    .delete_by_id("no-such-id", &ctx("u1"), None)
    .await
    .unwrap_err();
  assert!(matches!(err, RepoError::NotFound(_)));
  assert_eq!(repo.list().await.unwrap(), vec![record]);
}

#[tokio::test]
async fn test_delete_removes_exactly_one_record() {
  let (_dir, _store, repo) = setup().await;
  let first = repo.append(payload(json!({"n": 1})), "u1").await.unwrap();
  let second = repo.append(payload(json!({"n": 2})), "u1").await.unwrap();
  let third = repo.append(payload(json!({"n": 3})), "u1").await.unwrap();

  repo.delete_by_id(&second.id, &ctx("u1"), None).await.unwrap();
  assert_eq!(repo.list().await.unwrap(), vec![first, third]);
}

// =============================================================================
// Concurrency hazard
// =============================================================================

// A writer that read its snapshot before another writer landed silently
// discards that writer's change when it saves: the documented lost update.
#[tokio::test]
async fn test_stale_snapshot_write_loses_the_interleaved_update() {
  let (_dir, store, repo) = setup().await;
  let first = repo.append(payload(json!({"n": 1})), "u1").await.unwrap();

  // First writer's snapshot of the document.
  let stale_handle = store.find_by_name(DOC).await.unwrap().unwrap();
  let stale_bytes = store.read(&stale_handle).await.unwrap();

  // Second writer lands an append in the meantime.
  repo.append(payload(json!({"n": 2})), "u2").await.unwrap();
  assert_eq!(repo.list().await.unwrap().len(), 2);

  // First writer saves its stale snapshot: the second append is gone.
  store
    .write(DOC, &stale_bytes, Some(&stale_handle))
    .await
    .unwrap();
  assert_eq!(repo.list().await.unwrap(), vec![first]);
}

// The conditional-write seam turns the same interleaving into a detected
// conflict instead of a silent overwrite.
#[tokio::test]
async fn test_write_if_revision_detects_the_interleaving() {
  let (_dir, store, repo) = setup().await;
  repo.append(payload(json!({"n": 1})), "u1").await.unwrap();

  let stale_handle = store.find_by_name(DOC).await.unwrap().unwrap();
  let stale_bytes = store.read(&stale_handle).await.unwrap();

  repo.append(payload(json!({"n": 2})), "u2").await.unwrap();

  let err = store
    .write_if_revision(DOC, &stale_bytes, &stale_handle)
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::Conflict));
  assert_eq!(repo.list().await.unwrap().len(), 2);
}
