use crate::dto::{HealthResponse, SYSTEM_TAG};
use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::{Json, response::IntoResponse};

/// Liveness check.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = OK, description = "Server is up", body = HealthResponse)),
    tag = SYSTEM_TAG,
)]
pub(crate) async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        uptime: state.uptime(),
    };

    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
}
