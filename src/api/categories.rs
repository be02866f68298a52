//! Category endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        category::{Category, CategoryPayload},
        user::{ADMINS, ANY},
    },
};

use super::{ApiResponse, AuthenticatedUser, JsonBody, PathParam};

/// List categories
#[utoipa::path(
    get,
    path = "/category",
    tag = "categories",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All categories", body = Vec<Category>))
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse> {
    claims.authorize(ANY)?;

    let categories = state.services.catalog.list_categories().await?;
    Ok(ApiResponse::ok(categories))
}

#[utoipa::path(
    get,
    path = "/category/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(ApiResponse::ok(category))
}

#[utoipa::path(
    post,
    path = "/category",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CategoryPayload,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid or duplicate name", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Json(payload), _): JsonBody<CategoryPayload>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;
    payload.validate()?;

    let category = state.services.catalog.create_category(&payload.category_name).await?;
    Ok(ApiResponse::created(category))
}

#[utoipa::path(
    put,
    path = "/category/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryPayload,
    responses(
        (status = 200, description = "Category renamed", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(payload), _): JsonBody<CategoryPayload>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;
    payload.validate()?;

    let category = state
        .services
        .catalog
        .rename_category(id, &payload.category_name)
        .await?;
    Ok(ApiResponse::ok(category))
}

#[utoipa::path(
    delete,
    path = "/category/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 409, description = "Category still in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;

    state.services.catalog.delete_category(id).await?;
    Ok(ApiResponse::message("Category deleted"))
}
