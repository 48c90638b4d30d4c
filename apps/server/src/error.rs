//! # API errors
//!
//! Every failure leaves a handler as [`ApiError`] and reaches the client as
//! `{"code": "...", "message": "..."}`. Internal details are logged, never returned.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use shelf_storage::StorageError;
use std::borrow::Cow;
use std::io::ErrorKind;
use tracing::{error, warn};
use utoipa::ToSchema;

const BASIC_CHALLENGE: &str = "Basic realm=\"castshelf\"";

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. `CAST_NOT_FOUND`.
    pub code: String,
    pub message: String,
}

#[shelf_derive::shelf_error]
pub enum ApiError {
    #[error("{source}{}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("Unauthorized{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("User not found{}: {message}", format_context(.context))]
    UserNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Upload too large{}: {message}", format_context(.context))]
    PayloadTooLarge { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ApiError {
    pub(crate) fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unauthorized { message: message.into(), context: None }
    }

    pub(crate) fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest { message: message.into(), context: None }
    }

    pub(crate) fn user_not_found(username: &str) -> Self {
        Self::UserNotFound { message: username.to_owned().into(), context: None }
    }

    /// HTTP status and machine-readable code.
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Storage { source, .. } => match source {
                StorageError::Validation { .. } | StorageError::Parse { .. } => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                },
                StorageError::PathTraversal { .. } => {
                    (StatusCode::BAD_REQUEST, "PATH_TRAVERSAL_BLOCKED")
                },
                StorageError::InvalidToken { .. } => (StatusCode::BAD_REQUEST, "INVALID_TOKEN"),
                StorageError::NotFound { .. } => (StatusCode::NOT_FOUND, "CAST_NOT_FOUND"),
                StorageError::Auth { .. } => (StatusCode::UNAUTHORIZED, "INVALID_AUTH"),
                StorageError::Io { source, .. } if source.kind() == ErrorKind::FileTooLarge => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE")
                },
                StorageError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            Self::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "INVALID_AUTH"),
            Self::UserNotFound { .. } => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            Self::BadRequest { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            error!(error = %self, code, "Request failed");
            "An internal error occurred".to_owned()
        } else {
            warn!(error = %self, code, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        let mut response =
            (status, Json(ErrorBody { code: code.to_owned(), message })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(err: StorageError) -> ApiError {
        ApiError::from(err)
    }

    #[test]
    fn maps_storage_errors() {
        let cases = [
            (
                StorageError::Validation { message: "x".into(), context: None },
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                StorageError::Parse { message: "x".into(), context: None },
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                StorageError::PathTraversal { message: "x".into(), context: None },
                StatusCode::BAD_REQUEST,
                "PATH_TRAVERSAL_BLOCKED",
            ),
            (
                StorageError::InvalidToken { message: "x".into(), context: None },
                StatusCode::BAD_REQUEST,
                "INVALID_TOKEN",
            ),
            (
                StorageError::NotFound { message: "x".into(), context: None },
                StatusCode::NOT_FOUND,
                "CAST_NOT_FOUND",
            ),
            (
                StorageError::Auth { message: "x".into(), context: None },
                StatusCode::UNAUTHORIZED,
                "INVALID_AUTH",
            ),
            (
                StorageError::Io { source: std::io::Error::other("disk"), context: None },
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
            (
                StorageError::Io {
                    source: std::io::Error::new(ErrorKind::FileTooLarge, "limit"),
                    context: None,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(storage(err).status_and_code(), (status, code));
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let err = storage(StorageError::Io {
            source: std::io::Error::other("/srv/casts/alice: permission denied"),
            context: None,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response = ApiError::unauthorized("nope").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], BASIC_CHALLENGE);
    }
}
