use axum::{Extension, Json, extract::State};
use autopatch_core::PatchMode;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::CurrentUser,
    infra::{
        app_state::AppState,
        errors::{AppError, AppResult},
    },
};

#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    pub source: String,
    #[serde(default)]
    pub mode: PatchMode,
}

#[derive(Debug, Serialize)]
pub struct PatchResponse {
    pub mode: PatchMode,
    pub patched_source: String,
}

/// Patch a source string in memory without compiling it.
pub async fn patch_source(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<PatchRequest>,
) -> AppResult<Json<PatchResponse>> {
    if request.source.len() > state.config().workspace.max_upload_bytes {
        return Err(AppError::payload_too_large("Source exceeds the upload limit"));
    }

    let patched = state.pipeline.patch(&request.source, request.mode).await?;
    info!(username = %user.username, mode = %request.mode, "patched source");

    Ok(Json(PatchResponse {
        mode: request.mode,
        patched_source: patched,
    }))
}
