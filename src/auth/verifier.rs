use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Identity-token verification failure.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
  /// Token rejected: unknown to the issuer, wrong audience, or expired.
  #[error("invalid identity token: {0}")]
  Invalid(String),

  /// Issuer endpoint unreachable.
  #[error("identity issuer unavailable: {0}")]
  Unavailable(String),
}

/// Verifies an externally-issued identity token and yields the stable
/// subject identifier. Signature checking is the issuer's job; this seam
/// only carries the answer.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
  async fn verify(&self, token: &str) -> Result<String, VerifyError>;
}

/// Default tokeninfo endpoint of the supported issuer.
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Verifier that delegates to the issuer's tokeninfo endpoint and checks the
/// audience and expiry of whatever comes back.
pub struct TokeninfoVerifier {
  client: Client,
  endpoint: String,
  audience: String,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
  sub: String,
  aud: String,
  #[serde(default)]
  exp: Option<String>,
}

impl TokeninfoVerifier {
  pub fn new(
    endpoint: impl Into<String>,
    audience: impl Into<String>,
    timeout: Duration,
  ) -> Result<Self, VerifyError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| VerifyError::Unavailable(e.to_string()))?;
    Ok(Self {
      client,
      endpoint: endpoint.into(),
      audience: audience.into(),
    })
  }
}

#[async_trait]
impl IdentityVerifier for TokeninfoVerifier {
  async fn verify(&self, token: &str) -> Result<String, VerifyError> {
    let resp = self
      .client
      .get(&self.endpoint)
      .query(&[("id_token", token)])
      .send()
      .await
      .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

    // The endpoint answers 4xx for any token it does not recognize.
    if resp.status().is_client_error() {
      return Err(VerifyError::Invalid(format!(
        "issuer returned {}",
        resp.status()
      )));
    }
    if !resp.status().is_success() {
      return Err(VerifyError::Unavailable(format!(
        "issuer returned {}",
        resp.status()
      )));
    }

    let info: TokenInfo = resp
      .json()
      .await
      .map_err(|e| VerifyError::Invalid(e.to_string()))?;
    if info.aud != self.audience {
      return Err(VerifyError::Invalid(
        "token issued for a different audience".into(),
      ));
    }
    if let Some(exp) = info.exp.as_deref().and_then(|v| v.parse::<i64>().ok()) {
      if exp <= chrono::Utc::now().timestamp() {
        return Err(VerifyError::Invalid("token expired".into()));
      }
    }
    Ok(info.sub)
  }
}
