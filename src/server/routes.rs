use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::ApiError;
use crate::auth::{self, AuthContext, IdentityVerifier, SessionStore, SESSION_COOKIE};
use crate::repo::LocationRepository;
use crate::types::LocationRecord;

/// State shared by all handlers.
pub struct AppState {
  pub repo: LocationRepository,
  pub sessions: SessionStore,
  pub verifier: Arc<dyn IdentityVerifier>,
  pub admin_principal: Option<String>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/locations", get(list_locations).post(create_location))
    .route("/locations/{id}", delete(delete_location))
    .route("/login", post(login))
    .route("/logout", post(logout))
    .route("/check_login", get(check_login))
    .layer(middleware::from_fn_with_state(
      state.clone(),
      auth::auth_middleware,
    ))
    .with_state(state)
}

/// Public: every visitor sees all pins.
async fn list_locations(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LocationRecord>>, ApiError> {
  Ok(Json(state.repo.list().await?))
}

async fn create_location(
  State(state): State<Arc<AppState>>,
  Extension(ctx): Extension<AuthContext>,
  Json(payload): Json<Map<String, Value>>,
) -> Result<Json<LocationRecord>, ApiError> {
  // Gate before any store I/O.
  if !auth::can_create(&ctx) {
    return Err(ApiError::Unauthenticated);
  }
  let Some(owner) = ctx.principal.as_deref() else {
    return Err(ApiError::Unauthenticated);
  };

  let record = state.repo.append(payload, owner).await?;
  Ok(Json(record))
}

async fn delete_location(
  State(state): State<Arc<AppState>>,
  Extension(ctx): Extension<AuthContext>,
  Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
  // Gate before any store I/O; the owner/admin decision needs the record
  // and happens inside the repository.
  if !ctx.is_authenticated() {
    return Err(ApiError::Unauthenticated);
  }

  state
    .repo
    .delete_by_id(&id, &ctx, state.admin_principal.as_deref())
    .await?;
  Ok(Json(json!({ "message": "Location deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
  token: String,
}

async fn login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
  let principal = state.verifier.verify(&body.token).await?;
  tracing::info!(principal = %principal, "login");
  let session_id = state.sessions.open(principal);

  let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
  Ok(([(SET_COOKIE, cookie)], Json(json!({ "success": true }))).into_response())
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
  if let Some(session_id) = auth::session_cookie(&headers) {
    state.sessions.close(&session_id);
  }

  let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
  ([(SET_COOKIE, cookie)], Json(json!({ "success": true }))).into_response()
}

async fn check_login(Extension(ctx): Extension<AuthContext>) -> Json<Value> {
  Json(json!({
    "logged_in": ctx.is_authenticated(),
    "user_id": ctx.principal,
  }))
}
