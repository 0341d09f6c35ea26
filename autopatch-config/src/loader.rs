use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::{
    constants::{
        DEFAULT_DATABASE_URL, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES,
        DEFAULT_PASSWORD_PEPPER, DEFAULT_PORT, DEFAULT_PYTHON,
        DEFAULT_REMOTE_TIMEOUT_SECS, DEFAULT_SESSION_TTL_SECS,
        DEFAULT_WORKSPACE_ROOT,
    },
    models::{
        AuthConfig, Config, ConfigMetadata, CorsConfig, DatabaseConfig,
        FinderConfig, RemoteConfig, ServerConfig, ToolchainConfig,
        WorkspaceConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};
use autopatch_core::{
    completion::{DEFAULT_COMPLETION_MODEL, DEFAULT_COMPLETION_URL, DEFAULT_MAX_TOKENS},
    finder::{DEFAULT_ARG_SIZE, DEFAULT_CRASH_MARKER, DEFAULT_FINDER_TIMEOUT},
    toolchain::{DEFAULT_CC, DEFAULT_RUN_TIMEOUT},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("autopatch.toml"),
        PathBuf::from("config/autopatch.toml"),
    ]
});

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("config file {path} does not exist")]
    MissingConfig { path: PathBuf },
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Skip `.env` loading entirely.
    pub skip_env_file: bool,
    /// Report front-end guard rail violations as warnings instead of errors.
    pub workflow_only: bool,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.options.skip_env_file = true;
        self
    }

    /// Load for commands that never touch credentials or serve HTTP.
    pub fn workflow_only(mut self) -> Self {
        self.options.workflow_only = true;
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Load using an explicit environment snapshot.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No autopatch.toml detected; using environment variables and defaults",
                "Pass --config or set AUTOPATCH_CONFIG to point at a configuration file",
            );
        }

        let config = compose_config(
            file_config.unwrap_or_default(),
            env,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;
        warnings.extend(validation::apply_guard_rails(&config)?);
        match validation::check_front_end(&config) {
            Ok(()) => {}
            Err(err) if self.options.workflow_only => warnings.push_with_hint(
                err.to_string(),
                "Only the web front-end and credential commands enforce this",
            ),
            Err(err) => return Err(err.into()),
        }

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.options.skip_env_file {
            return Ok(false);
        }
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };
        match loaded {
            Ok(loaded) => Ok(loaded),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => found.clone(),
                None => return Ok((None, None)),
            },
        };

        Ok((Some(read_file_config(&path)?), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn duration(
    field: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match value {
        None => Ok(default),
        Some(value) => humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
    }
}

/// Environment wins over the file, the file wins over defaults.
fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        server: file_server,
        database: file_database,
        auth: file_auth,
        toolchain: file_toolchain,
        finder: file_finder,
        remote: file_remote,
        workspace: file_workspace,
        cors: file_cors,
        dev_mode: file_dev_mode,
    } = file;

    let server = ServerConfig {
        host: env
            .host
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
    };

    let database = DatabaseConfig {
        url: env
            .database_url
            .or(file_database.url)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
    };

    let auth = AuthConfig {
        password_pepper: env
            .password_pepper
            .or(file_auth.password_pepper)
            .unwrap_or_else(|| DEFAULT_PASSWORD_PEPPER.to_string()),
        session_ttl: duration(
            "auth.session_ttl",
            env.session_ttl.or(file_auth.session_ttl),
            Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        )?,
        required: env.auth_required.or(file_auth.required).unwrap_or(true),
        allow_registration: env
            .allow_registration
            .or(file_auth.allow_registration)
            .unwrap_or(true),
    };

    let toolchain = ToolchainConfig {
        cc: env
            .cc
            .or(file_toolchain.cc)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CC)),
        run_timeout: duration(
            "toolchain.run_timeout",
            file_toolchain.run_timeout,
            DEFAULT_RUN_TIMEOUT,
        )?,
    };

    let finder = FinderConfig {
        python: env
            .python
            .or(file_finder.python)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON)),
        timeout: duration(
            "finder.timeout",
            env.finder_timeout.or(file_finder.timeout),
            DEFAULT_FINDER_TIMEOUT,
        )?,
        crash_marker: file_finder
            .crash_marker
            .unwrap_or_else(|| DEFAULT_CRASH_MARKER.to_string()),
        arg_size: file_finder.arg_size.unwrap_or(DEFAULT_ARG_SIZE),
        probe_fallback: file_finder.probe_fallback.unwrap_or(true),
    };

    let remote = RemoteConfig {
        endpoint: env
            .completion_url
            .or(file_remote.endpoint)
            .unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string()),
        model: env
            .completion_model
            .or(file_remote.model)
            .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
        api_key: env.api_key.or(file_remote.api_key),
        max_tokens: file_remote.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        timeout: duration(
            "remote.timeout",
            file_remote.timeout,
            Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        )?,
    };

    let workspace = WorkspaceConfig {
        root: env
            .workspace_root
            .or(file_workspace.root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE_ROOT)),
        max_upload_bytes: file_workspace
            .max_upload_bytes
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .or(file_cors.allowed_origins)
            .unwrap_or_default(),
    };

    Ok(Config {
        server,
        database,
        auth,
        toolchain,
        finder,
        remote,
        workspace,
        cors,
        dev_mode: env.dev_mode.or(file_dev_mode).unwrap_or(false),
        metadata,
    })
}
