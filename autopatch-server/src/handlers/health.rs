use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut health = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "auth_required": state.auth_required(),
        "remote_patching": state.pipeline.supports(autopatch_core::PatchMode::Remote),
        "checks": {}
    });

    let status = match state.credentials.list().await {
        Ok(users) => {
            health["checks"]["credentials"] = json!({
                "status": "healthy",
                "users": users.len(),
            });
            StatusCode::OK
        }
        Err(err) => {
            warn!(error = %err, "credential store health check failed");
            health["status"] = json!("unhealthy");
            health["checks"]["credentials"] = json!({ "status": "unhealthy" });
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, Json(health))
}
