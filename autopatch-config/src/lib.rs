//! Configuration for the autopatch server and CLI.
//!
//! Values are layered: built-in defaults, then an optional `autopatch.toml`,
//! then `AUTOPATCH_*` environment variables (optionally seeded from `.env`).

pub mod constants;
pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    AuthConfig, Config, ConfigMetadata, CorsConfig, DatabaseConfig, FinderConfig,
    RemoteConfig, ServerConfig, ToolchainConfig, WorkspaceConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
