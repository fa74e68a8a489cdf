use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{DocumentStore, FileHandle, StoreError};

/// Connection settings for the Drive-style files API.
#[derive(Debug, Clone)]
pub struct DriveConfig {
  /// Metadata endpoint base, e.g. `https://www.googleapis.com`.
  pub api_base: String,
  /// Upload endpoint base; the hosted API serves uploads from the same host.
  pub upload_base: String,
  /// Bearer token for the backend account that owns the private namespace.
  pub access_token: String,
  /// Storage area queried and written, e.g. `appDataFolder`.
  pub namespace: String,
  /// Deadline applied to every request.
  pub request_timeout: Duration,
}

/// Remote document store backed by a Drive-style files API.
///
/// Objects live in an app-private namespace and are addressed by opaque file
/// ids; every operation starts from a name → id lookup because the API has
/// no name-keyed content endpoint.
pub struct DriveStore {
  client: Client,
  config: DriveConfig,
}

#[derive(Debug, Deserialize)]
struct FileList {
  #[serde(default)]
  files: Vec<FileMeta>,
}

#[derive(Debug, Deserialize)]
struct FileMeta {
  id: String,
  #[serde(default)]
  version: Option<String>,
}

impl DriveStore {
  pub fn new(config: DriveConfig) -> Result<Self, StoreError> {
    let client = Client::builder()
      .timeout(config.request_timeout)
      .build()
      .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    Ok(Self { client, config })
  }

  fn files_url(&self) -> String {
    format!("{}/drive/v3/files", self.config.api_base)
  }

  fn upload_url(&self) -> String {
    format!("{}/upload/drive/v3/files", self.config.upload_base)
  }
}

#[async_trait]
impl DocumentStore for DriveStore {
  async fn find_by_name(&self, name: &str) -> Result<Option<FileHandle>, StoreError> {
    let query = format!("name = '{}' and trashed = false", escape_query(name));
    let resp = self
      .client
      .get(self.files_url())
      .bearer_auth(&self.config.access_token)
      .query(&[
        ("q", query.as_str()),
        ("spaces", self.config.namespace.as_str()),
        ("fields", "files(id, version)"),
      ])
      .send()
      .await
      .map_err(|e| request_error(e, "lookup", false))?;
    let resp = check_status(resp, "lookup").await?;

    let list: FileList = resp
      .json()
      .await
      .map_err(|e| request_error(e, "lookup", false))?;
    if list.files.len() > 1 {
      // A create race can leave two objects under one name; converge on the
      // first match until the next write replaces it.
      tracing::warn!(
        name,
        matches = list.files.len(),
        "multiple documents share one name, using the first"
      );
    }
    Ok(list.files.into_iter().next().map(|f| FileHandle {
      id: f.id,
      revision: f.version,
    }))
  }

  async fn read(&self, handle: &FileHandle) -> Result<Vec<u8>, StoreError> {
    let url = format!("{}/{}", self.files_url(), handle.id);
    let resp = self
      .client
      .get(&url)
      .bearer_auth(&self.config.access_token)
      .query(&[("alt", "media")])
      .send()
      .await
      .map_err(|e| request_error(e, "download", false))?;
    let resp = check_status(resp, "download").await?;

    let bytes = resp
      .bytes()
      .await
      .map_err(|e| request_error(e, "download", false))?;
    Ok(bytes.to_vec())
  }

  async fn write(
    &self,
    name: &str,
    bytes: &[u8],
    existing: Option<&FileHandle>,
  ) -> Result<FileHandle, StoreError> {
    let resp = match existing {
      // Update in place: plain media upload against the known id.
      Some(handle) => self
        .client
        .patch(format!("{}/{}", self.upload_url(), handle.id))
        .bearer_auth(&self.config.access_token)
        .query(&[("uploadType", "media"), ("fields", "id, version")])
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(bytes.to_vec())
        .send()
        .await
        .map_err(|e| request_error(e, "update", true))?,

      // Create: multipart upload carrying the name + parent metadata.
      None => {
        let metadata = serde_json::json!({
          "name": name,
          "parents": [self.config.namespace],
        });
        let form = multipart::Form::new()
          .part(
            "metadata",
            part_json(multipart::Part::text(metadata.to_string()))?,
          )
          .part("media", part_json(multipart::Part::bytes(bytes.to_vec()))?);

        self
          .client
          .post(self.upload_url())
          .bearer_auth(&self.config.access_token)
          .query(&[("uploadType", "multipart"), ("fields", "id, version")])
          .multipart(form)
          .send()
          .await
          .map_err(|e| request_error(e, "create", true))?
      }
    };

    let op = if existing.is_some() { "update" } else { "create" };
    let resp = check_status(resp, op).await?;
    let meta: FileMeta = resp.json().await.map_err(|e| request_error(e, op, true))?;
    Ok(FileHandle {
      id: meta.id,
      revision: meta.version,
    })
  }
}

fn part_json(part: multipart::Part) -> Result<multipart::Part, StoreError> {
  part
    .mime_str("application/json")
    .map_err(|e| StoreError::Unavailable(e.to_string()))
}

/// Map a transport failure. Mutating operations report timeouts as
/// outcome-unknown: the upload may have landed even though the answer never
/// arrived.
fn request_error(e: reqwest::Error, op: &'static str, mutating: bool) -> StoreError {
  if e.is_timeout() {
    StoreError::Timeout {
      op,
      outcome_unknown: mutating,
    }
  } else {
    StoreError::Unavailable(e.to_string())
  }
}

async fn check_status(
  resp: reqwest::Response,
  op: &'static str,
) -> Result<reqwest::Response, StoreError> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let detail = resp.text().await.unwrap_or_default();
  let detail = detail.chars().take(200).collect::<String>();
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
      Err(StoreError::Denied(format!("{op}: {status}: {detail}")))
    }
    _ => Err(StoreError::Unavailable(format!("{op}: {status}: {detail}"))),
  }
}

// Names are embedded in a single-quoted query term.
fn escape_query(name: &str) -> String {
  name.replace('\\', "\\\\").replace('\'', "\\'")
}
