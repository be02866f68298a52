//! User management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{CreateUser, UpdateRole, UpdateUser, User, ADMINS, SUPERADMIN_ONLY},
};

use super::{ApiResponse, AuthenticatedUser, JsonBody, PathParam};

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of users", body = Vec<User>),
        (status = 403, description = "Insufficient rights", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;

    let users = state.services.users.list().await?;
    Ok(ApiResponse::ok(users))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 403, description = "Access denied", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    let user = state.services.users.get(&claims, id).await?;
    Ok(ApiResponse::ok(user))
}

/// Create a user with any role
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid data", body = crate::error::ErrorResponse),
        (status = 403, description = "Insufficient rights", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Json(user), _): JsonBody<CreateUser>,
) -> AppResult<ApiResponse> {
    claims.authorize(SUPERADMIN_ONLY)?;
    user.validate()?;

    let created = state.services.users.create(user).await?;
    Ok(ApiResponse::created(created))
}

/// Update profile fields of a user
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Access denied", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(user), _): JsonBody<UpdateUser>,
) -> AppResult<ApiResponse> {
    user.validate()?;

    let updated = state.services.users.update(&claims, id, user).await?;
    Ok(ApiResponse::ok(updated))
}

/// Change the role of a user
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRole,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 403, description = "Insufficient rights", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_role(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(request), _): JsonBody<UpdateRole>,
) -> AppResult<ApiResponse> {
    claims.authorize(SUPERADMIN_ONLY)?;

    let user = state.services.users.update_role(id, request.role).await?;
    Ok(ApiResponse::ok(user))
}

/// Delete a user without loan history
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Insufficient rights", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "User has loan history", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    claims.authorize(SUPERADMIN_ONLY)?;

    state.services.users.delete(&claims, id).await?;
    Ok(ApiResponse::message("User deleted"))
}
