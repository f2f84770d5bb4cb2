//! Request failures and their HTTP mapping.
//!
//! Every failure is mapped at the point of detection to exactly one status and
//! a short message rendered as `{"error": "..."}`. Internal details go to the
//! log, never to the client.

use crate::auth::{CredentialError, SessionError};
use crate::files::BlobError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidUsername(msg) | CredentialError::InvalidPassword(msg) => {
                Self::BadRequest(msg)
            }
            CredentialError::AlreadyExists => Self::Conflict("Username is already taken".into()),
            CredentialError::AuthFailed => Self::Unauthorized,
            CredentialError::Hashing(detail) => {
                tracing::error!(error = %detail, "Password hashing failed");
                Self::Internal("Failed to create user".into())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Malformed | SessionError::InvalidSignature | SessionError::Expired => {
                tracing::debug!(reason = %err, "Session rejected");
                Self::Unauthorized
            }
            SessionError::EmptySecret | SessionError::Signing(_) => {
                tracing::error!(error = %err, "Session signing failed");
                Self::Internal("Failed to create token".into())
            }
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(_) => Self::NotFound("File not found".into()),
            BlobError::InvalidName(name) => Self::BadRequest(format!("Invalid filename: {name:?}")),
            BlobError::Io(e) => {
                tracing::error!(error = %e, "Blob I/O failed");
                Self::Internal("File storage failed".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn each_kind_maps_to_one_status() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), 400);
        assert_eq!(ApiError::Unauthorized.status(), 401);
        assert_eq!(ApiError::NotFound("x".into()).status(), 404);
        assert_eq!(ApiError::Conflict("x".into()).status(), 409);
        assert_eq!(ApiError::PayloadTooLarge.status(), 413);
        assert_eq!(ApiError::Internal("x".into()).status(), 500);
    }

    #[test]
    fn every_session_failure_is_unauthorized() {
        for err in [
            SessionError::Malformed,
            SessionError::InvalidSignature,
            SessionError::Expired,
        ] {
            assert!(matches!(ApiError::from(err), ApiError::Unauthorized));
        }
    }

    #[test]
    fn credential_failures_map_cleanly() {
        assert!(matches!(
            ApiError::from(CredentialError::AuthFailed),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(CredentialError::AlreadyExists),
            ApiError::Conflict(_)
        ));
        let internal = ApiError::from(CredentialError::Hashing("boom: detail".into()));
        assert_eq!(internal.to_string(), "Failed to create user");
    }

    #[tokio::test]
    async fn renders_json_error_body() {
        let response = ApiError::NotFound("File not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "File not found");
    }
}
