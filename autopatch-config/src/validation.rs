use thiserror::Error;
use tracing::warn;

use crate::models::Config;

/// Minimum length for a non-default pepper.
const MIN_PEPPER_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("authentication secret {field} {reason}")]
    WeakSecret { field: &'static str, reason: String },
    #[error("CORS wildcard origins are not allowed when dev_mode is false")]
    DangerousCorsWildcard,
    #[error("finder.arg_size must be at least 1")]
    InvalidArgSize,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn log(&self) {
        for warning in &self.items {
            match &warning.hint {
                Some(hint) => warn!(hint = %hint, "{}", warning.message),
                None => warn!("{}", warning.message),
            }
        }
    }
}

/// Checks that apply to every entry point.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.finder.arg_size == 0 {
        return Err(ConfigGuardRailError::InvalidArgSize);
    }

    if config.auth.is_default_pepper() {
        warnings.push_with_hint(
            "password pepper uses the built-in placeholder",
            "Set AUTOPATCH_PASSWORD_PEPPER (or auth.password_pepper) before storing real credentials",
        );
    }

    if !config.auth.required {
        warnings.push_with_hint(
            "authentication is disabled; every route is reachable without a session",
            "Set AUTOPATCH_AUTH_REQUIRED=true to gate uploads behind a login",
        );
    }

    if config.remote.api_key.is_none() {
        warnings.push(
            "no completion API key configured; remote-assisted patching is disabled",
        );
    }

    Ok(warnings)
}

/// Checks for settings only the web front-end and the credential table use.
pub fn check_front_end(config: &Config) -> Result<(), ConfigGuardRailError> {
    if !config.auth.is_default_pepper()
        && config.auth.password_pepper.len() < MIN_PEPPER_LENGTH
    {
        return Err(ConfigGuardRailError::WeakSecret {
            field: "AUTOPATCH_PASSWORD_PEPPER",
            reason: format!("must be at least {MIN_PEPPER_LENGTH} characters"),
        });
    }

    if !config.dev_mode
        && config.cors.allowed_origins.iter().any(|origin| origin == "*")
    {
        return Err(ConfigGuardRailError::DangerousCorsWildcard);
    }

    Ok(())
}
