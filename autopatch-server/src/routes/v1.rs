use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use crate::{
    auth::{gate_middleware, session_middleware},
    handlers::{auth, patch, runs},
    infra::app_state::AppState,
};

/// Slack for multipart boundaries and headers around the uploaded file.
const MULTIPART_OVERHEAD: usize = 16 * 1024;

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        // Public authentication endpoints
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(create_session_routes(state.clone()))
        .merge(create_workflow_routes(state))
}

fn create_session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .layer(middleware::from_fn_with_state(state, session_middleware))
}

fn create_workflow_routes(state: AppState) -> Router<AppState> {
    let body_limit = state.config().workspace.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route("/runs", post(runs::create_run))
        .route("/patch", post(patch::patch_source))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state, gate_middleware))
}
