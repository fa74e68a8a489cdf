mod config;
mod daemon;
mod error;
mod routes;

pub use config::{
  AuthSection, BackendType, DocumentSection, DriveSection, LimitsSection, LocalSection,
  LoggingSection, ServerConfig, ServerSection,
};
pub use daemon::Daemon;
pub use error::ApiError;
pub use routes::{build_router, AppState};
