use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::routes::{build_router, AppState};
use super::ServerConfig;

/// HTTP front-end: binds, serves, drains on shutdown.
pub struct Daemon {
  config: ServerConfig,
  state: Arc<AppState>,
}

impl Daemon {
  pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
    Self { config, state }
  }

  pub async fn run(
    &self,
    shutdown: impl Future<Output = ()> + Send + 'static,
  ) -> Result<(), anyhow::Error> {
    let app = build_router(self.state.clone()).layer(self.cors_layer());

    let addr: SocketAddr = self.config.address().parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("geopin listening on {}", addr);

    axum::serve(listener, app)
      .with_graceful_shutdown(shutdown)
      .await?;
    Ok(())
  }

  fn cors_layer(&self) -> CorsLayer {
    let origins = &self.config.server.cors_origins;
    let allow_origin = if origins.iter().any(|o| o == "*") {
      AllowOrigin::any()
    } else {
      AllowOrigin::list(
        origins
          .iter()
          .filter_map(|o| o.parse::<HeaderValue>().ok()),
      )
    };
    CorsLayer::new()
      .allow_origin(allow_origin)
      .allow_methods(Any)
      .allow_headers(Any)
  }
}
