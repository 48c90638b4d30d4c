use crate::handlers::{casts, health, spa, uploads, users};
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_scalar::{Scalar, Servable};

/// Room for multipart boundaries and part headers on top of the file limit.
const MULTIPART_SLACK: u64 = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    info(title = "CastShelf", description = "Self-hosted asciinema recording shelf"),
    modifiers(&BasicAuthAddon),
    tags(
        (name = "system", description = "Health checks"),
        (name = "casts", description = "Upload and download recordings"),
        (name = "users", description = "Owner administration"),
    )
)]
struct ApiDoc;

struct BasicAuthAddon;

impl Modify for BasicAuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "admin_basic",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Basic)
                    .description(Some("Operator credentials from the admin config section"))
                    .build(),
            ),
        );
        components.add_security_scheme(
            "machine_basic",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Basic)
                    .description(Some("Owner name and machine id"))
                    .build(),
            ),
        );
    }
}

fn upload_router(limit: u64) -> OpenApiRouter<AppState> {
    let body_limit = usize::try_from(limit.saturating_add(MULTIPART_SLACK)).unwrap_or(usize::MAX);

    OpenApiRouter::new()
        .routes(routes!(uploads::upload_cast))
        .layer(DefaultBodyLimit::max(body_limit))
}

pub(crate) fn init(state: AppState) -> Router {
    let limit = state.config.upload.max_upload_bytes();

    let (api_routes, api_doc) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(health::healthz))
        .merge(upload_router(limit))
        .routes(routes!(users::create_user, users::list_users))
        .routes(routes!(users::list_user_casts))
        .routes(routes!(casts::cast_by_path))
        .routes(routes!(casts::cast_by_token))
        .split_for_parts();

    Router::new()
        .merge(api_routes)
        .merge(Scalar::with_url("/api/docs", api_doc))
        .fallback(spa::spa_fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
