use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::GOOGLE_TOKENINFO_URL;
use crate::store::DriveConfig;

/// Expand `${VAR}` references against the process environment. Unset
/// variables expand to the empty string.
fn expand_env_vars(input: &str) -> String {
  let mut result = String::with_capacity(input.len());
  let mut rest = input;
  while let Some(start) = rest.find("${") {
    let Some(end) = rest[start..].find('}') else { break };
    result.push_str(&rest[..start]);
    let name = &rest[start + 2..start + end];
    result.push_str(&std::env::var(name).unwrap_or_default());
    rest = &rest[start + end + 1..];
  }
  result.push_str(rest);
  result
}

/// Which document store backs the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
  #[default]
  Drive,
  Local,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default)]
  pub server: ServerSection,
  #[serde(default)]
  pub backend: BackendType,
  #[serde(default)]
  pub drive: DriveSection,
  #[serde(default)]
  pub local: LocalSection,
  #[serde(default)]
  pub document: DocumentSection,
  #[serde(default)]
  pub auth: AuthSection,
  #[serde(default)]
  pub limits: LimitsSection,
  #[serde(default)]
  pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  /// CORS allowed origins; `["*"]` for permissive mode.
  #[serde(default = "default_cors_origins")]
  pub cors_origins: Vec<String>,
}

fn default_host() -> String {
  "0.0.0.0".into()
}
fn default_port() -> u16 {
  8081
}
fn default_cors_origins() -> Vec<String> {
  vec!["*".to_string()]
}

impl Default for ServerSection {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      cors_origins: default_cors_origins(),
    }
  }
}

/// Drive-style remote backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveSection {
  #[serde(default = "default_api_base")]
  pub api_base: String,
  #[serde(default = "default_api_base")]
  pub upload_base: String,
  /// Bearer token for the backend account; usually `${GEOPIN_DRIVE_TOKEN}`.
  #[serde(default)]
  pub access_token: String,
  #[serde(default = "default_namespace")]
  pub namespace: String,
}

fn default_api_base() -> String {
  "https://www.googleapis.com".into()
}
fn default_namespace() -> String {
  "appDataFolder".into()
}

impl Default for DriveSection {
  fn default() -> Self {
    Self {
      api_base: default_api_base(),
      upload_base: default_api_base(),
      access_token: String::new(),
      namespace: default_namespace(),
    }
  }
}

/// Local mirror backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSection {
  #[serde(default = "default_local_path")]
  pub path: String,
}

fn default_local_path() -> String {
  "./data".into()
}

impl Default for LocalSection {
  fn default() -> Self {
    Self {
      path: default_local_path(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSection {
  /// Name of the shared location document inside the private namespace.
  #[serde(default = "default_document_name")]
  pub name: String,
}

fn default_document_name() -> String {
  "locations.json".into()
}

impl Default for DocumentSection {
  fn default() -> Self {
    Self {
      name: default_document_name(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
  /// OAuth client id the identity tokens must be issued for.
  #[serde(default)]
  pub client_id: String,
  #[serde(default = "default_tokeninfo_url")]
  pub tokeninfo_url: String,
  /// Principal allowed to delete any record, not just their own.
  #[serde(default)]
  pub admin_user_id: Option<String>,
}

fn default_tokeninfo_url() -> String {
  GOOGLE_TOKENINFO_URL.into()
}

impl Default for AuthSection {
  fn default() -> Self {
    Self {
      client_id: String::new(),
      tokeninfo_url: default_tokeninfo_url(),
      admin_user_id: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSection {
  /// Deadline for each call against the remote backend and the identity
  /// issuer, in milliseconds.
  #[serde(default = "default_request_timeout_ms")]
  pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
  10_000
}

impl Default for LimitsSection {
  fn default() -> Self {
    Self {
      request_timeout_ms: default_request_timeout_ms(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
  #[serde(default = "default_level")]
  pub level: String,
}

fn default_level() -> String {
  "info".into()
}

impl Default for LoggingSection {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

impl ServerConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
    let content = std::fs::read_to_string(&path)?;
    let expanded = expand_env_vars(&content);
    Ok(serde_yaml::from_str(&expanded)?)
  }

  pub fn find_and_load() -> Result<Option<Self>, anyhow::Error> {
    for p in ["geopin.yaml", "geopin.yml"] {
      if Path::new(p).exists() {
        tracing::info!("Loading config from {}", p);
        return Ok(Some(Self::from_file(p)?));
      }
    }
    Ok(None)
  }

  pub fn address(&self) -> String {
    format!("{}:{}", self.server.host, self.server.port)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.limits.request_timeout_ms)
  }
}

impl From<&ServerConfig> for DriveConfig {
  fn from(config: &ServerConfig) -> Self {
    Self {
      api_base: config.drive.api_base.trim_end_matches('/').to_string(),
      upload_base: config.drive.upload_base.trim_end_matches('/').to_string(),
      access_token: config.drive.access_token.clone(),
      namespace: config.drive.namespace.clone(),
      request_timeout: config.request_timeout(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_env_expansion() {
    std::env::set_var("GEOPIN_TEST_TOKEN", "tok-123");
    let yaml = "drive:\n  access_token: \"${GEOPIN_TEST_TOKEN}\"\n";
    let expanded = expand_env_vars(yaml);
    assert!(expanded.contains("tok-123"));

    let config: ServerConfig = serde_yaml::from_str(&expanded).unwrap();
    assert_eq!(config.drive.access_token, "tok-123");
    // Untouched sections keep their defaults.
    assert_eq!(config.document.name, "locations.json");
    assert_eq!(config.server.port, 8081);
  }

  #[test]
  fn test_unset_var_expands_empty() {
    assert_eq!(expand_env_vars("a ${GEOPIN_TEST_UNSET_VAR} b"), "a  b");
  }
}
