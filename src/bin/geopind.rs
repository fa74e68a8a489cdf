use clap::Parser;
use geopin::auth::{SessionStore, TokeninfoVerifier};
use geopin::repo::LocationRepository;
use geopin::server::{AppState, BackendType, Daemon, ServerConfig};
use geopin::store::{DocumentStore, DriveStore, LocalDirStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "geopind", about = "geopin location report server", version)]
struct Args {
  #[arg(short, long)]
  config: Option<String>,
  #[arg(long)]
  host: Option<String>,
  #[arg(short, long)]
  port: Option<u16>,
  #[arg(long, env = "GEOPIN_DRIVE_TOKEN")]
  drive_token: Option<String>,
  #[arg(long, env = "GEOPIN_LOCAL_PATH")]
  local: Option<String>,
  #[arg(long)]
  log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  // Load config: explicit path > auto-detect > defaults
  let mut config = if let Some(path) = &args.config {
    ServerConfig::from_file(path)?
  } else {
    ServerConfig::find_and_load()?.unwrap_or_default()
  };

  // CLI args override the config file
  if let Some(host) = args.host {
    config.server.host = host;
  }
  if let Some(port) = args.port {
    config.server.port = port;
  }
  if let Some(token) = args.drive_token {
    config.drive.access_token = token;
    config.backend = BackendType::Drive;
  }
  if let Some(path) = args.local {
    config.local.path = path;
    config.backend = BackendType::Local;
  }
  if let Some(level) = args.log_level {
    config.logging.level = level;
  }

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let store: Arc<dyn DocumentStore> = match config.backend {
    BackendType::Drive => Arc::new(DriveStore::new((&config).into())?),
    BackendType::Local => {
      let store = LocalDirStore::new(&config.local.path);
      store.init().await?;
      tracing::info!("local mirror at {}", config.local.path);
      Arc::new(store)
    }
  };

  let verifier = TokeninfoVerifier::new(
    config.auth.tokeninfo_url.clone(),
    config.auth.client_id.clone(),
    config.request_timeout(),
  )?;

  let state = Arc::new(AppState {
    repo: LocationRepository::new(store, config.document.name.clone()),
    sessions: SessionStore::new(),
    verifier: Arc::new(verifier),
    admin_principal: config.auth.admin_user_id.clone(),
  });

  let daemon = Daemon::new(config, state);
  daemon.run(shutdown_signal()).await
}

async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c()
      .await
      .expect("Failed to install Ctrl+C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("Failed to install SIGTERM handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("Received SIGINT"),
    _ = terminate => tracing::info!("Received SIGTERM"),
  }
}
