//! Local username/password table gating the web front-end.

mod crypto;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use crypto::{PasswordHashError, PasswordHasher};
pub use sqlite::{MIGRATOR, SqliteCredentialStore};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

/// Failures of the credential table and its password hashing.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),

    #[error("user '{0}' not found")]
    NotFound(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Hash(#[from] PasswordHashError),

    #[error("password hashing worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("credential storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("credential migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Stored credential row. The hash never leaves the crate through `Serialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Storage for the username/password table.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new credential; fails with
    /// [`CredentialError::DuplicateUsername`] when the key exists.
    async fn create(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialRecord, CredentialError>;

    async fn find(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, CredentialError>;

    /// Check a username/password pair. Unknown users and wrong passwords
    /// are indistinguishable to the caller.
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialRecord, CredentialError>;

    async fn delete(&self, username: &str) -> Result<(), CredentialError>;

    async fn list(&self) -> Result<Vec<CredentialRecord>, CredentialError>;
}

pub fn validate_username(username: &str) -> Result<(), CredentialError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(CredentialError::Validation(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CredentialError::Validation(
            "username can only contain letters, numbers, underscores, and hyphens"
                .to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), CredentialError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(CredentialError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(CredentialError::Validation(format!(
            "password cannot exceed {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}
