use std::{str::FromStr, sync::Arc};

use once_cell::sync::OnceCell;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use tracing::{debug, info};

use super::{
    CredentialError, CredentialRecord, CredentialStore, PasswordHasher,
    validate_password, validate_username,
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Hashed once and checked against when the username is unknown, so both
/// failure paths pay for one Argon2 verification.
const DUMMY_PASSWORD: &str = "autopatch-unknown-user-placeholder";

/// Credential table stored in SQLite. Username uniqueness is the table's
/// primary-key constraint.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
    hasher: Arc<PasswordHasher>,
    dummy_hash: Arc<OnceCell<String>>,
}

impl SqliteCredentialStore {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(
        url: &str,
        hasher: Arc<PasswordHasher>,
    ) -> Result<Self, CredentialError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self::new(pool, hasher);
        store.migrate().await?;
        info!(url, "credential store ready");
        Ok(store)
    }

    pub fn new(pool: SqlitePool, hasher: Arc<PasswordHasher>) -> Self {
        Self {
            pool,
            hasher,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub async fn migrate(&self) -> Result<(), CredentialError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn map_row(row: &SqliteRow) -> Result<CredentialRecord, CredentialError> {
        Ok(CredentialRecord {
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    async fn hash_password(&self, password: &str) -> Result<String, CredentialError> {
        let hasher = Arc::clone(&self.hasher);
        let password = zeroize::Zeroizing::new(password.to_owned());
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await?
            .map_err(CredentialError::from)
    }

    async fn dummy_hash(&self) -> Result<String, CredentialError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = self.hash_password(DUMMY_PASSWORD).await?;
        Ok(self.dummy_hash.get_or_init(|| hash).clone())
    }

    async fn verify_hash(
        &self,
        password: &str,
        stored_hash: String,
    ) -> Result<bool, CredentialError> {
        let hasher = Arc::clone(&self.hasher);
        let password = zeroize::Zeroizing::new(password.to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await?
            .map_err(CredentialError::from)
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn create(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialRecord, CredentialError> {
        validate_username(username)?;
        validate_password(password)?;

        let password_hash = self.hash_password(password).await?;
        let created_at = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO credentials (username, password_hash, created_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                info!(username, "credential created");
                Ok(CredentialRecord {
                    username: username.to_string(),
                    password_hash,
                    created_at,
                })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(username, "rejected duplicate username");
                Err(CredentialError::DuplicateUsername(username.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, CredentialError> {
        let row = sqlx::query(
            r#"
            SELECT username, password_hash, created_at
            FROM credentials
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialRecord, CredentialError> {
        let Some(record) = self.find(username).await? else {
            debug!(username, "login for unknown user");
            let dummy = self.dummy_hash().await?;
            self.verify_hash(password, dummy).await?;
            return Err(CredentialError::InvalidCredentials);
        };

        if self
            .verify_hash(password, record.password_hash.clone())
            .await?
        {
            Ok(record)
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }

    async fn delete(&self, username: &str) -> Result<(), CredentialError> {
        let result = sqlx::query("DELETE FROM credentials WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CredentialError::NotFound(username.to_string()));
        }
        info!(username, "credential deleted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CredentialRecord>, CredentialError> {
        let rows = sqlx::query(
            r#"
            SELECT username, password_hash, created_at
            FROM credentials
            ORDER BY username ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
