pub mod v1;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{handlers::health::health_handler, infra::app_state::AppState};

/// Hard cap on any request body, above the per-route upload limit.
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Create the main API router with all versions
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new().nest("/api/v1", v1::create_v1_router(state))
}

pub fn create_app(state: AppState) -> Router {
    let request_limit = MAX_REQUEST_BYTES.max(state.config().workspace.max_upload_bytes * 2);

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .merge(create_api_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(request_limit));

    if let Some(cors) = build_cors_layer(&state.config().cors.allowed_origins) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

fn build_cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_origins_means_no_cors_layer() {
        assert!(build_cors_layer(&[]).is_none());
        assert!(build_cors_layer(&["http://localhost:5173".to_string()]).is_some());
    }
}
