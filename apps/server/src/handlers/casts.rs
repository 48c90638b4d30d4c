use crate::auth::AdminAccess;
use crate::dto::{CASTS_TAG, CastFileQuery};
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use shelf_storage::CastFile;
use tokio_util::io::ReaderStream;

/// Download a cast by its storage-relative path.
///
/// A `path` without any `/` is taken as a token: the web player resolves `/play/<token>` links
/// through this endpoint.
#[utoipa::path(
    get,
    path = "/api/casts/file",
    params(CastFileQuery),
    responses(
        (status = OK, description = "Raw cast content", content_type = "application/octet-stream", body = Vec<u8>),
        (status = BAD_REQUEST, description = "Path escapes the storage root or malformed token", body = ErrorBody),
        (status = NOT_FOUND, description = "No such cast", body = ErrorBody),
        (status = UNAUTHORIZED, description = "Admin credentials required", body = ErrorBody),
    ),
    security(("admin_basic" = [])),
    tag = CASTS_TAG,
)]
pub(crate) async fn cast_by_path(
    _admin: AdminAccess,
    State(state): State<AppState>,
    query: Result<Query<CastFileQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let cast = if query.path.contains('/') {
        state.store.fetch_by_path(&query.path).await?
    } else {
        state.store.fetch_by_token(&query.path).await?
    };
    Ok(stream(cast))
}

/// Download a cast by its token.
#[utoipa::path(
    get,
    path = "/api/casts/{token}",
    params(("token" = String, Path, description = "Cast token from an upload or listing")),
    responses(
        (status = OK, description = "Raw cast content", content_type = "application/octet-stream", body = Vec<u8>),
        (status = BAD_REQUEST, description = "Malformed token", body = ErrorBody),
        (status = NOT_FOUND, description = "No such cast", body = ErrorBody),
        (status = UNAUTHORIZED, description = "Admin credentials required", body = ErrorBody),
    ),
    security(("admin_basic" = [])),
    tag = CASTS_TAG,
)]
pub(crate) async fn cast_by_token(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let cast = state.store.fetch_by_token(&token).await?;
    Ok(stream(cast))
}

fn stream(cast: CastFile) -> Response {
    let body = Body::from_stream(ReaderStream::new(cast.file));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_LENGTH, HeaderValue::from(cast.size)),
        ],
        body,
    )
        .into_response()
}
