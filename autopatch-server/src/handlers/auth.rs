use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{CurrentUser, bearer_token},
    infra::{
        app_state::AppState,
        errors::{AppError, AppResult},
    },
};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    if !state.config().auth.allow_registration {
        return Err(AppError::forbidden("Registration is disabled"));
    }

    let record = state
        .credentials
        .create(request.username.trim(), &request.password)
        .await?;
    info!(username = %record.username, "registered new user");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: record.username,
            created_at: record.created_at,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> AppResult<Json<LoginResponse>> {
    let record = state
        .credentials
        .verify(request.username.trim(), &request.password)
        .await?;
    let issued = state.sessions.issue(&record.username)?;
    info!(username = %record.username, "login succeeded");

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer",
        username: issued.session.username,
        expires_at: issued.session.expires_at,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.revoke(token);
    }
    info!(username = %user.username, "logged out");
    StatusCode::NO_CONTENT
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<CurrentUser> {
    Json(user)
}
