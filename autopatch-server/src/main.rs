//! # autopatch server
//!
//! Serves the upload front-end: sign in, submit a C file, and read back the
//! compile, crash-search, patch and verification output.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use autopatch_config::{ConfigLoader, ConfigLoaderOptions};
use autopatch_core::{PasswordHasher, SqliteCredentialStore};
use autopatch_server::{AppState, create_app};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "autopatch-server")]
#[command(about = "Web front-end for compiling, crash-searching and patching C uploads")]
struct Cli {
    /// Path to an autopatch.toml configuration file
    #[arg(long, env = "AUTOPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let load = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
        skip_env_file: false,
        workflow_only: false,
    })
    .load()
    .context("failed to load configuration")?;

    let mut config = load.config;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "loaded configuration file");
    }
    load.warnings.log();

    let hasher = PasswordHasher::new(config.auth.password_pepper.as_bytes())
        .context("invalid password pepper")?;
    let credentials = SqliteCredentialStore::connect(&config.database.url, Arc::new(hasher))
        .await
        .with_context(|| format!("failed to open credential store at {}", config.database.url))?;

    tokio::fs::create_dir_all(&config.workspace.root)
        .await
        .with_context(|| {
            format!(
                "failed to create workspace root {}",
                config.workspace.root.display()
            )
        })?;
    let pipeline = config.pipeline().context("failed to build completion client")?;

    if !config.auth.required {
        warn!("authentication gate is disabled");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let state = AppState::new(Arc::new(config), Arc::new(credentials), pipeline);
    spawn_session_sweeper(&state);
    let router = create_app(state);

    info!("Starting autopatch server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

fn spawn_session_sweeper(state: &AppState) {
    let sessions = Arc::clone(&state.sessions);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                debug!(purged, "expired sessions removed");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
