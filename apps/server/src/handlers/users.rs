use crate::auth::AdminAccess;
use crate::dto::{
    CastItem, CastListResponse, CreateUserRequest, USERS_TAG, UserCredentialResponse,
    UserListResponse,
};
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use shelf_storage::Owner;

/// Register an owner, or return the existing machine id.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = CREATED, description = "Owner created", body = UserCredentialResponse),
        (status = OK, description = "Owner already existed", body = UserCredentialResponse),
        (status = BAD_REQUEST, description = "Invalid username", body = ErrorBody),
        (status = UNAUTHORIZED, description = "Admin credentials required", body = ErrorBody),
    ),
    security(("admin_basic" = [])),
    tag = USERS_TAG,
)]
pub(crate) async fn create_user(
    _admin: AdminAccess,
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserCredentialResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let (credential, created) = state.store.register_owner(&request.username).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };

    Ok((
        status,
        Json(UserCredentialResponse {
            username: request.username,
            machine_id: credential.expose().to_owned(),
        }),
    ))
}

/// Registered owners, sorted by name.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = OK, description = "Registered owners", body = UserListResponse),
        (status = UNAUTHORIZED, description = "Admin credentials required", body = ErrorBody),
    ),
    security(("admin_basic" = [])),
    tag = USERS_TAG,
)]
pub(crate) async fn list_users(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, ApiError> {
    let items: Vec<String> =
        state.store.list_owners().await?.into_iter().map(|o| o.to_string()).collect();
    Ok(Json(UserListResponse { total: items.len(), items }))
}

/// An owner's casts, newest partition first.
#[utoipa::path(
    get,
    path = "/api/users/{username}/casts",
    params(("username" = String, Path, description = "Owner name")),
    responses(
        (status = OK, description = "Casts of the owner", body = CastListResponse),
        (status = BAD_REQUEST, description = "Invalid username", body = ErrorBody),
        (status = NOT_FOUND, description = "Unknown owner", body = ErrorBody),
        (status = UNAUTHORIZED, description = "Admin credentials required", body = ErrorBody),
    ),
    security(("admin_basic" = [])),
    tag = USERS_TAG,
)]
pub(crate) async fn list_user_casts(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<CastListResponse>, ApiError> {
    let owner = Owner::try_from(username.as_str())?;
    if !state.store.owner_exists(owner.as_str()).await {
        return Err(ApiError::user_not_found(owner.as_str()));
    }

    let items: Vec<CastItem> =
        state.store.list(owner.as_str()).await?.into_iter().map(CastItem::from).collect();
    Ok(Json(CastListResponse { total: items.len(), items }))
}
