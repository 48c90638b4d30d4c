//! Basic-auth extractors.
//!
//! Two audiences share the `Authorization: Basic` scheme: the operator (credentials from
//! config) and recording clients (owner name plus the owner's machine credential).

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use shelf_kernel::security::BasicCredentials;
use tracing::warn;

fn basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing basic auth"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid basic auth"))?;

    BasicCredentials::from_header(value).map_err(|e| ApiError::unauthorized(e.to_string()))
}

/// Proof that the request carries the configured admin credentials.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let credentials = basic_credentials(&parts.headers)?;
        let admin = &state.config.admin;

        if credentials.matches(&admin.username, &admin.password) {
            Ok(Self)
        } else {
            warn!(username = credentials.username(), "Admin authentication failed");
            Err(ApiError::unauthorized("unauthorized"))
        }
    }
}

/// An owner authenticated by `owner:machine-id`, as sent by `asciinema upload`.
#[derive(Debug, Clone)]
pub(crate) struct Uploader {
    pub(crate) owner: String,
}

impl FromRequestParts<AppState> for Uploader {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let credentials = basic_credentials(&parts.headers)?;
        state.store.verify_credential(credentials.username(), credentials.password()).await?;
        Ok(Self { owner: credentials.username().to_owned() })
    }
}
