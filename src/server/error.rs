use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::VerifyError;
use crate::repo::RepoError;
use crate::store::StoreError;

/// Everything a handler can surface, mapped onto the HTTP status space.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("Unauthorized")]
  Unauthenticated,

  #[error("You do not have permission to delete this location.")]
  Forbidden,

  #[error("Location not found")]
  NotFound,

  #[error("Invalid token")]
  InvalidToken,

  #[error("identity issuer unavailable: {0}")]
  IssuerUnavailable(String),

  #[error("stored location data is corrupt: {0}")]
  MalformedDocument(String),

  #[error("storage backend unavailable: {0}")]
  BackendUnavailable(String),

  #[error("storage backend denied access: {0}")]
  BackendDenied(String),

  #[error("storage request timed out")]
  Timeout,

  #[error("storage write timed out; it may or may not have been applied")]
  TimeoutOutcomeUnknown,

  #[error("the location list was modified concurrently")]
  Conflict,
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      Self::Unauthenticated => StatusCode::UNAUTHORIZED,
      Self::Forbidden => StatusCode::FORBIDDEN,
      Self::NotFound => StatusCode::NOT_FOUND,
      Self::InvalidToken => StatusCode::BAD_REQUEST,
      Self::IssuerUnavailable(_) => StatusCode::BAD_GATEWAY,
      Self::MalformedDocument(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Self::BackendUnavailable(_) | Self::BackendDenied(_) => StatusCode::BAD_GATEWAY,
      Self::Timeout | Self::TimeoutOutcomeUnknown => StatusCode::GATEWAY_TIMEOUT,
      Self::Conflict => StatusCode::CONFLICT,
    }
  }
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::Unavailable(detail) => Self::BackendUnavailable(detail),
      StoreError::Denied(detail) => Self::BackendDenied(detail),
      StoreError::Timeout {
        outcome_unknown: true,
        ..
      } => Self::TimeoutOutcomeUnknown,
      StoreError::Timeout { .. } => Self::Timeout,
      StoreError::Conflict => Self::Conflict,
    }
  }
}

impl From<RepoError> for ApiError {
  fn from(e: RepoError) -> Self {
    match e {
      RepoError::NotFound(_) => Self::NotFound,
      RepoError::Forbidden => Self::Forbidden,
      RepoError::Malformed(source) => Self::MalformedDocument(source.to_string()),
      RepoError::Store(source) => source.into(),
    }
  }
}

impl From<VerifyError> for ApiError {
  fn from(e: VerifyError) -> Self {
    match e {
      VerifyError::Invalid(_) => Self::InvalidToken,
      VerifyError::Unavailable(detail) => Self::IssuerUnavailable(detail),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(%status, error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
