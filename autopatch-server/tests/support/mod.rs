use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use autopatch_config::{ConfigLoader, EnvConfig};
use autopatch_core::{PasswordHasher, SqliteCredentialStore};
use autopatch_server::{AppState, create_app};
use axum_test::TestServer;
use serde_json::{Value, json};
use tempfile::TempDir;

pub const PASSWORD: &str = "correct-horse-battery";

#[derive(Debug, Clone, Copy)]
pub struct TestOptions {
    pub auth_required: bool,
    pub allow_registration: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            auth_required: true,
            allow_registration: true,
        }
    }
}

// Code is used by test modules, but not in every one of them
#[allow(unused)]
#[derive(Debug)]
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    _tempdir: TempDir,
}

#[allow(unused)]
pub async fn build_test_app() -> Result<TestApp> {
    build_test_app_with(TestOptions::default()).await
}

pub async fn build_test_app_with(options: TestOptions) -> Result<TestApp> {
    let tempdir = tempfile::tempdir().context("failed to create temporary directory")?;
    let root = tempdir.path();
    let config_path = root.join("autopatch.toml");

    // No angr in the test environment: point the engine at a missing
    // interpreter so runs go straight to the probe finder.
    let contents = format!(
        r#"
[database]
url = "sqlite://{db}"

[auth]
password_pepper = "integration-test-pepper-value"
required = {required}
allow_registration = {allow_registration}

[finder]
python = "{root}/no-such-python"
timeout = "5s"

[workspace]
root = "{root}/runs"
"#,
        db = root.join("credentials.db").display(),
        root = root.display(),
        required = options.auth_required,
        allow_registration = options.allow_registration,
    );
    std::fs::write(&config_path, contents).context("failed to write config")?;

    let config = ConfigLoader::new()
        .with_config_path(&config_path)
        .load_with_env(EnvConfig::default(), false)?
        .config;

    let hasher = PasswordHasher::low_cost(config.auth.password_pepper.as_bytes())?;
    let credentials =
        SqliteCredentialStore::connect(&config.database.url, Arc::new(hasher)).await?;
    let pipeline = config.pipeline()?;

    let state = AppState::new(Arc::new(config), Arc::new(credentials), pipeline);
    let make_service = create_app(state.clone())
        .into_make_service_with_connect_info::<SocketAddr>();
    let server = TestServer::builder()
        .http_transport()
        .build(make_service)
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        _tempdir: tempdir,
    })
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[allow(unused)]
pub async fn register(server: &TestServer, username: &str) {
    server
        .post("/api/v1/auth/register")
        .json(&json!({ "username": username, "password": PASSWORD }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

/// Register `username` and return a session token for it.
#[allow(unused)]
pub async fn register_and_login(server: &TestServer, username: &str) -> String {
    register(server, username).await;
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": username, "password": PASSWORD }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["token"]
        .as_str()
        .expect("login returns a token")
        .to_string()
}
