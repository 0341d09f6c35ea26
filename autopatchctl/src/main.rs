//! `autopatchctl`: patch, compile, crash-search and manage web users from the
//! command line.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use autopatch_config::{Config, ConfigLoader, ConfigLoaderOptions};
use autopatch_core::PatchMode;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "autopatchctl", about = "Find and guard division-by-zero crashes in C programs")]
struct Cli {
    /// Path to an autopatch.toml configuration file
    #[arg(long, global = true, env = "AUTOPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert a division-by-zero guard into a C source file
    Patch {
        /// Source file to patch
        src: PathBuf,
        /// Where to write the patched file
        dst: PathBuf,
        /// template: fixed guard block; remote: block from a completion endpoint
        #[arg(long, default_value = "template")]
        mode: PatchMode,
        /// Completion API key (falls back to AUTOPATCH_API_KEY / OPENAI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Compile a C source file with the configured compiler
    Compile {
        src: PathBuf,
        /// Output binary (defaults to the source path without extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Search a compiled binary for a crashing argument
    Find {
        binary: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compile, crash-search, patch and verify a source file
    Run {
        src: PathBuf,
        #[arg(long, default_value = "template")]
        mode: PatchMode,
        #[arg(long)]
        api_key: Option<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the web front-end's credential table
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// Create a user (prompts for the password when --password is omitted)
    Add {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete a user
    Remove { username: String },
    /// List usernames
    List,
}

fn load_config(cli: &Cli) -> Result<Config> {
    // Only `users` reads the pepper; the other commands never look at it.
    let workflow_only = !matches!(cli.command, Command::Users { .. });
    let load = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
        skip_env_file: false,
        workflow_only,
    })
    .load()
    .context("failed to load configuration")?;

    for warning in &load.warnings.items {
        debug!(hint = ?warning.hint, "{}", warning.message);
    }
    Ok(load.config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Patch {
            src,
            dst,
            mode,
            api_key,
        } => commands::patch::run(&config, &src, &dst, mode, api_key.as_deref()).await,
        Command::Compile { src, output } => {
            commands::workflow::compile(&config, &src, output).await
        }
        Command::Find { binary, json } => commands::workflow::find(&config, &binary, json).await,
        Command::Run {
            src,
            mode,
            api_key,
            json,
        } => commands::workflow::run(&config, &src, mode, api_key.as_deref(), json).await,
        Command::Users { action } => match action {
            UsersAction::Add { username, password } => {
                commands::users::add(&config, &username, password).await
            }
            UsersAction::Remove { username } => {
                commands::users::remove(&config, &username).await
            }
            UsersAction::List => commands::users::list(&config).await,
        },
    }
}
