use std::{path::PathBuf, sync::Arc, time::Duration};

use autopatch_core::{
    completion::{CompletionSettings, HttpCompletionClient},
    finder::{FinderChain, ProbeFinder, SymbolicFinder, SymbolicFinderConfig},
    patch::RemotePatcher,
    pipeline::Pipeline,
    toolchain::Toolchain,
};

use crate::constants::DEFAULT_PASSWORD_PEPPER;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub toolchain: ToolchainConfig,
    pub finder: FinderConfig,
    pub remote: RemoteConfig,
    pub workspace: WorkspaceConfig,
    pub cors: CorsConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub password_pepper: String,
    pub session_ttl: Duration,
    /// When false the web front-end serves every route without a session.
    pub required: bool,
    pub allow_registration: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("password_pepper", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("required", &self.required)
            .field("allow_registration", &self.allow_registration)
            .finish()
    }
}

impl AuthConfig {
    pub fn is_default_pepper(&self) -> bool {
        self.password_pepper == DEFAULT_PASSWORD_PEPPER
    }
}

#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    pub cc: PathBuf,
    pub run_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FinderConfig {
    pub python: PathBuf,
    pub timeout: Duration,
    pub crash_marker: String,
    pub arg_size: usize,
    /// Fall back to the concrete probe when the engine is not installed.
    pub probe_fallback: bool,
}

#[derive(Clone)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteConfig {
    pub fn settings(&self) -> CompletionSettings {
        CompletionSettings {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        }
    }

    /// Build a remote patcher using `api_key`, or the configured key.
    pub fn patcher(
        &self,
        api_key: Option<&str>,
    ) -> Option<Result<RemotePatcher, autopatch_core::completion::CompletionError>>
    {
        let key = api_key.or(self.api_key.as_deref())?;
        Some(
            HttpCompletionClient::new(key, self.settings())
                .map(|client| RemotePatcher::new(Arc::new(client))),
        )
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Config {
    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(&self.toolchain.cc).with_run_timeout(self.toolchain.run_timeout)
    }

    pub fn finder_chain(&self) -> FinderChain {
        let symbolic = SymbolicFinder::new(SymbolicFinderConfig {
            python: self.finder.python.clone(),
            timeout: self.finder.timeout,
            crash_marker: self.finder.crash_marker.clone(),
            arg_size: self.finder.arg_size,
        });
        let fallback = self.finder.probe_fallback.then(|| {
            ProbeFinder::new(self.toolchain())
                .with_crash_marker(self.finder.crash_marker.clone())
        });
        FinderChain::new(symbolic, fallback)
    }

    /// Assemble the upload workflow. Remote-assisted patching is wired in
    /// only when an API key is configured.
    pub fn pipeline(
        &self,
    ) -> Result<Pipeline, autopatch_core::completion::CompletionError> {
        let pipeline =
            Pipeline::new(self.toolchain(), self.finder_chain(), &self.workspace.root);
        match self.remote.patcher(None) {
            Some(remote) => Ok(pipeline.with_remote_patcher(remote?)),
            None => Ok(pipeline),
        }
    }
}
