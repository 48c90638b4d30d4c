use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

/// Serves the web client from `static_dir`, answering unknown paths with `index.html`.
///
/// Unmatched `/api` paths stay a plain 404.
pub(crate) async fn spa_fallback(State(state): State<AppState>, request: Request) -> Response {
    if request.uri().path().starts_with("/api") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let dir = &state.config.storage.static_dir;
    let index = dir.join("index.html");
    if !tokio::fs::try_exists(&index).await.unwrap_or(false) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match ServeDir::new(dir).fallback(ServeFile::new(index)).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
