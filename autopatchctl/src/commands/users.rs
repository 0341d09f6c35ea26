use std::sync::Arc;

use anyhow::{Context, Result};
use autopatch_config::Config;
use autopatch_core::{CredentialStore, PasswordHasher, SqliteCredentialStore};
use dialoguer::Password;

async fn open_store(config: &Config) -> Result<SqliteCredentialStore> {
    let hasher = PasswordHasher::new(config.auth.password_pepper.as_bytes())
        .context("invalid password pepper")?;
    SqliteCredentialStore::connect(&config.database.url, Arc::new(hasher))
        .await
        .with_context(|| format!("failed to open credential store at {}", config.database.url))
}

pub async fn add(config: &Config, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt(format!("Password for {username}"))
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()
            .context("failed to read password")?,
    };

    let store = open_store(config).await?;
    let record = store.create(username, &password).await?;
    println!("Created user {}", record.username);
    Ok(())
}

pub async fn remove(config: &Config, username: &str) -> Result<()> {
    let store = open_store(config).await?;
    store.delete(username).await?;
    println!("Removed user {username}");
    Ok(())
}

pub async fn list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let users = store.list().await?;
    if users.is_empty() {
        println!("No users");
        return Ok(());
    }
    for user in users {
        println!("{}\t{}", user.username, user.created_at.to_rfc3339());
    }
    Ok(())
}
