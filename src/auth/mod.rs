mod verifier;

pub use verifier::{IdentityVerifier, TokeninfoVerifier, VerifyError, GOOGLE_TOKENINFO_URL};

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::RwLock;
use rand::RngCore;

use crate::server::AppState;

/// Request-scoped authentication state: the verified subject identifier of
/// the logged-in caller, if any. Handlers receive this explicitly instead of
/// reading ambient session state.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
  pub principal: Option<String>,
}

impl AuthContext {
  pub fn is_authenticated(&self) -> bool {
    self.principal.is_some()
  }
}

/// Any authenticated caller may create records.
pub fn can_create(ctx: &AuthContext) -> bool {
  ctx.is_authenticated()
}

/// Deletion is restricted to the record's owner and the admin principal.
pub fn can_delete(ctx: &AuthContext, owner_id: &str, admin_principal: Option<&str>) -> bool {
  match ctx.principal.as_deref() {
    Some(principal) => principal == owner_id || admin_principal == Some(principal),
    None => false,
  }
}

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "geopin_session";

/// Server-side session map: opaque cookie value → principal.
#[derive(Default)]
pub struct SessionStore {
  sessions: RwLock<HashMap<String, String>>,
}

impl SessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Open a session for a verified principal, returning the cookie value.
  pub fn open(&self, principal: String) -> String {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let id = hex::encode(raw);
    self.sessions.write().insert(id.clone(), principal);
    id
  }

  pub fn principal(&self, session_id: &str) -> Option<String> {
    self.sessions.read().get(session_id).cloned()
  }

  /// Drop a session; unknown ids are a no-op.
  pub fn close(&self, session_id: &str) {
    self.sessions.write().remove(session_id);
  }
}

/// Resolve the session cookie into an [`AuthContext`] and stash it in the
/// request extensions. Runs on every route; authorization decisions stay
/// with the handlers.
pub async fn auth_middleware(
  State(state): State<Arc<AppState>>,
  mut request: Request,
  next: Next,
) -> Response {
  let ctx = session_cookie(request.headers())
    .and_then(|id| state.sessions.principal(&id))
    .map(|principal| AuthContext {
      principal: Some(principal),
    })
    .unwrap_or_default();
  request.extensions_mut().insert(ctx);
  next.run(request).await
}

/// Session id from the Cookie header, if present.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
  let header = headers.get(COOKIE)?.to_str().ok()?;
  header.split(';').find_map(|pair| {
    let (name, value) = pair.trim().split_once('=')?;
    (name == SESSION_COOKIE).then(|| value.to_string())
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ctx(principal: Option<&str>) -> AuthContext {
    AuthContext {
      principal: principal.map(String::from),
    }
  }

  #[test]
  fn test_create_requires_principal() {
    assert!(can_create(&ctx(Some("u1"))));
    assert!(!can_create(&ctx(None)));
  }

  #[test]
  fn test_delete_owner_and_admin_only() {
    let admin = Some("admin-1");
    assert!(can_delete(&ctx(Some("u1")), "u1", admin));
    assert!(can_delete(&ctx(Some("admin-1")), "u1", admin));
    assert!(!can_delete(&ctx(Some("u2")), "u1", admin));
    assert!(!can_delete(&ctx(None), "u1", admin));
    // No admin configured: ownership is the only grant.
    assert!(!can_delete(&ctx(Some("u2")), "u1", None));
  }

  #[test]
  fn test_session_lifecycle() {
    let sessions = SessionStore::new();
    let id = sessions.open("u1".into());
    assert_eq!(sessions.principal(&id).as_deref(), Some("u1"));
    sessions.close(&id);
    assert_eq!(sessions.principal(&id), None);
  }

  #[test]
  fn test_session_ids_are_unique() {
    let sessions = SessionStore::new();
    let a = sessions.open("u1".into());
    let b = sessions.open("u1".into());
    assert_ne!(a, b);
  }

  #[test]
  fn test_cookie_extraction() {
    let mut headers = HeaderMap::new();
    headers.insert(
      COOKIE,
      "other=1; geopin_session=abc123; theme=dark".parse().unwrap(),
    );
    assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, "other=1".parse().unwrap());
    assert_eq!(session_cookie(&headers), None);
  }
}
