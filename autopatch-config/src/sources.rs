use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub toolchain: FileToolchainConfig,
    #[serde(default)]
    pub finder: FileFinderConfig,
    #[serde(default)]
    pub remote: FileRemoteConfig,
    #[serde(default)]
    pub workspace: FileWorkspaceConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_pepper: Option<String>,
    /// humantime duration, e.g. "12h".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_registration: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileToolchainConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileFinderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_fallback: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileRemoteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileWorkspaceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub password_pepper: Option<String>,
    pub session_ttl: Option<String>,
    pub auth_required: Option<bool>,
    pub allow_registration: Option<bool>,
    pub cc: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub finder_timeout: Option<String>,
    pub workspace_root: Option<PathBuf>,
    pub api_key: Option<String>,
    pub completion_url: Option<String>,
    pub completion_model: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub dev_mode: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::gather_with(|key| std::env::var(key).ok())
    }

    /// Gather from an arbitrary lookup; tests pass a map instead of touching
    /// the process environment.
    pub fn gather_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| var(key).and_then(|v| parse_bool(&v));

        Self {
            config_path: var("AUTOPATCH_CONFIG").map(PathBuf::from),
            host: var("AUTOPATCH_HOST"),
            port: var("AUTOPATCH_PORT").and_then(|s| s.parse().ok()),
            database_url: var("AUTOPATCH_DATABASE_URL"),
            password_pepper: var("AUTOPATCH_PASSWORD_PEPPER"),
            session_ttl: var("AUTOPATCH_SESSION_TTL"),
            auth_required: flag("AUTOPATCH_AUTH_REQUIRED"),
            allow_registration: flag("AUTOPATCH_ALLOW_REGISTRATION"),
            cc: var("AUTOPATCH_CC").map(PathBuf::from),
            python: var("AUTOPATCH_PYTHON").map(PathBuf::from),
            finder_timeout: var("AUTOPATCH_FINDER_TIMEOUT"),
            workspace_root: var("AUTOPATCH_WORKSPACE").map(PathBuf::from),
            api_key: var("AUTOPATCH_API_KEY").or_else(|| var("OPENAI_API_KEY")),
            completion_url: var("AUTOPATCH_COMPLETION_URL"),
            completion_model: var("AUTOPATCH_COMPLETION_MODEL"),
            cors_allowed_origins: var("AUTOPATCH_CORS_ALLOWED_ORIGINS").map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            dev_mode: flag("AUTOPATCH_DEV_MODE"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
