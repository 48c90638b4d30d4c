use crate::auth::Uploader;
use crate::dto::{CASTS_TAG, UploadForm, UploadResponse};
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use futures::{Stream, StreamExt};
use std::io;
use tokio_util::io::StreamReader;
use tracing::info;

/// Multipart field carrying the recording.
const UPLOAD_FIELD: &str = "asciicast";

/// Upload a recording (`asciinema upload` compatible).
///
/// Authenticates with Basic `owner:machine-id` and stores the file under today's partition.
#[utoipa::path(
    post,
    path = "/api/asciicasts",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = CREATED, description = "Cast stored", body = UploadResponse),
        (status = BAD_REQUEST, description = "Missing field or invalid header", body = ErrorBody),
        (status = UNAUTHORIZED, description = "Unknown owner or wrong machine id", body = ErrorBody),
        (status = PAYLOAD_TOO_LARGE, description = "Upload exceeds the size limit", body = ErrorBody),
    ),
    security(("machine_basic" = [])),
    tag = CASTS_TAG,
)]
pub(crate) async fn upload_cast(
    State(state): State<AppState>,
    uploader: Uploader,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let limit = state.config.upload.max_upload_bytes();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let reader = StreamReader::new(Box::pin(limited(field, limit)));
        let stored = state.store.store(&uploader.owner, reader).await?;

        let url = play_url(&state, &headers, &stored.token);
        info!(owner = %uploader.owner, rel_path = %stored.rel_path, size = stored.size, "Upload accepted");
        return Ok((StatusCode::CREATED, Json(UploadResponse::new(stored, url))));
    }

    Err(ApiError::bad_request(format!("missing {UPLOAD_FIELD} field")))
}

/// Fails the stream with `FileTooLarge` once more than `limit` bytes have been seen.
fn limited<S>(field: S, limit: u64) -> impl Stream<Item = io::Result<Bytes>>
where
    S: Stream<Item = Result<Bytes, MultipartError>>,
{
    let mut seen = 0_u64;
    field.map(move |chunk| {
        let chunk = chunk.map_err(stream_error)?;
        seen = seen.saturating_add(chunk.len() as u64);
        if seen > limit {
            return Err(io::Error::new(
                io::ErrorKind::FileTooLarge,
                format!("upload exceeds {limit} bytes"),
            ));
        }
        Ok(chunk)
    })
}

fn stream_error(err: MultipartError) -> io::Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        io::Error::new(io::ErrorKind::FileTooLarge, err.body_text())
    } else {
        io::Error::other(err)
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { message: err.body_text().into(), context: None }
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// `<base>/play/<token>`, where the base is `public_base_url` or derived from proxy headers.
pub(crate) fn play_url(state: &AppState, headers: &HeaderMap, token: &str) -> String {
    let base = state.config.public_base_url.as_deref().map_or_else(
        || request_base(headers, state.config.server.ssl.is_some()),
        |configured| configured.trim_end_matches('/').to_owned(),
    );
    format!("{base}/play/{token}")
}

fn request_base(headers: &HeaderMap, tls: bool) -> String {
    let scheme =
        header_value(headers, "x-forwarded-proto").unwrap_or(if tls { "https" } else { "http" });
    let host = header_value(headers, "x-forwarded-host")
        .or_else(|| header_value(headers, header::HOST.as_str()))
        .unwrap_or("localhost");
    let prefix =
        header_value(headers, "x-forwarded-prefix").map_or("", |p| p.trim_end_matches('/'));

    format!("{scheme}://{host}{prefix}")
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn base_from_host_header() {
        assert_eq!(request_base(&headers(&[("host", "casts.local:8080")]), false), "http://casts.local:8080");
        assert_eq!(request_base(&HeaderMap::new(), true), "https://localhost");
    }

    #[test]
    fn base_honours_proxy_headers() {
        let map = headers(&[
            ("host", "10.0.0.5:8080"),
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "casts.example.org"),
            ("x-forwarded-prefix", "/shelf/"),
        ]);
        assert_eq!(request_base(&map, false), "https://casts.example.org/shelf");
    }
}
