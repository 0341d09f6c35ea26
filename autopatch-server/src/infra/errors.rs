use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use autopatch_core::{
    PatchError, credentials::CredentialError, pipeline::PipelineError,
};

use super::sessions::SessionError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::DuplicateUsername(_) => Self::conflict(err.to_string()),
            CredentialError::InvalidCredentials => Self::unauthorized(err.to_string()),
            CredentialError::NotFound(_) => Self::not_found(err.to_string()),
            CredentialError::Validation(msg) => Self::bad_request(msg),
            other => {
                tracing::error!(error = ?other, "credential operation failed");
                Self::internal("Credential storage failed")
            }
        }
    }
}

impl From<PatchError> for AppError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::PatternNotFound | PatchError::InsertionPointNotFound => {
                Self::unprocessable(err.to_string())
            }
            PatchError::MissingCredential => Self::bad_request(err.to_string()),
            PatchError::EmptyCompletion | PatchError::Completion(_) => {
                tracing::warn!(error = %err, "remote-assisted patch failed");
                Self::bad_gateway(err.to_string())
            }
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::RemoteUnavailable => Self::bad_request(err.to_string()),
            PipelineError::Patch(patch) => patch.into(),
            PipelineError::Workspace { .. } => {
                tracing::error!(error = %err, "run directory unavailable");
                Self::internal("Failed to prepare run directory")
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        tracing::error!(error = %err, "session issue failed");
        Self::internal("Failed to issue session")
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_username_maps_to_conflict() {
        let err: AppError = CredentialError::DuplicateUsername("alice".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert!(err.message.contains("alice"));
    }

    #[test]
    fn missing_pattern_maps_to_unprocessable() {
        let err: AppError = PatchError::PatternNotFound.into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message, "could not find the expected pattern to patch");
    }

    #[test]
    fn storage_errors_hide_details() {
        let err: AppError = CredentialError::Storage(sqlx::Error::PoolClosed).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Credential storage failed");
    }

    #[tokio::test]
    async fn hashing_worker_failures_are_internal() {
        let join_err = tokio::spawn(async { panic!("hasher panicked") })
            .await
            .unwrap_err();
        let err: AppError = CredentialError::Worker(join_err).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Credential storage failed");
    }

    #[test]
    fn pipeline_patch_errors_keep_their_status() {
        let err: AppError = PipelineError::Patch(PatchError::PatternNotFound).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
