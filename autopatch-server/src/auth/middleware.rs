use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::infra::{app_state::AppState, errors::AppError};

/// The caller a request runs on behalf of. Inserted into the request
/// extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub username: String,
    /// False when the gate is disabled and no session was presented.
    pub authenticated: bool,
}

impl CurrentUser {
    pub fn anonymous() -> Self {
        Self {
            username: "anonymous".to_string(),
            authenticated: false,
        }
    }
}

/// Requires a live session regardless of configuration.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Requires a live session when `auth.required` is set; otherwise lets the
/// request through, attaching the session user if one was presented.
pub async fn gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = if state.auth_required() {
        authenticate(&state, request.headers())?
    } else {
        authenticate(&state, request.headers()).unwrap_or_else(|_| CurrentUser::anonymous())
    };
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    let session = state
        .sessions
        .resolve(token)
        .ok_or_else(|| AppError::unauthorized("Session is invalid or expired"))?;
    Ok(CurrentUser {
        username: session.username,
        authenticated: true,
    })
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
