//! Product catalog and unit endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        product::{
            CreateProduct, CreateUnit, Product, ProductDetails, ProductQuery, ProductUnit,
            RepairUnit, RetireUnit, UnitQuery, UpdateProduct,
        },
        user::ADMINS,
    },
};

use super::{ApiResponse, AuthenticatedUser, JsonBody, PathParam, QueryParams};

/// List products
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    security(("bearer_auth" = [])),
    params(ProductQuery),
    responses(
        (status = 200, description = "Products with availability", body = Vec<Product>)
    )
)]
pub async fn list_products(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Query(query), _): QueryParams<ProductQuery>,
) -> AppResult<ApiResponse> {
    let products = state.services.catalog.list_products(&query).await?;
    Ok(ApiResponse::ok(products))
}

/// Get product with its category and units
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product details", body = ProductDetails),
        (status = 404, description = "Product not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_product(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(ApiResponse::ok(product))
}

/// Create a product with its initial units
#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    security(("bearer_auth" = [])),
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid data", body = crate::error::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_product(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Json(product), _): JsonBody<CreateProduct>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;
    product.validate()?;

    let created = state.services.catalog.create_product(&product).await?;
    Ok(ApiResponse::created(created))
}

#[utoipa::path(
    patch,
    path = "/products/{id}",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_product(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(product), _): JsonBody<UpdateProduct>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;
    product.validate()?;

    let updated = state.services.catalog.update_product(id, &product).await?;
    Ok(ApiResponse::ok(updated))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 409, description = "Product has units on loan or loan history", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_product(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;

    state.services.catalog.delete_product(id).await?;
    Ok(ApiResponse::message("Product deleted"))
}

/// List units of a product
#[utoipa::path(
    get,
    path = "/products/{id}/units",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID"), UnitQuery),
    responses(
        (status = 200, description = "Units", body = Vec<ProductUnit>),
        (status = 404, description = "Product not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_units(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Query(query), _): QueryParams<UnitQuery>,
) -> AppResult<ApiResponse> {
    let units = state.services.catalog.list_units(id, query.status).await?;
    Ok(ApiResponse::ok(units))
}

/// Register an additional unit
#[utoipa::path(
    post,
    path = "/products/{id}/units",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CreateUnit,
    responses(
        (status = 201, description = "Unit added", body = ProductUnit),
        (status = 400, description = "Serial number already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_unit(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(unit), _): JsonBody<CreateUnit>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;
    unit.validate()?;

    let created = state.services.catalog.add_unit(id, &unit.serial_number).await?;
    Ok(ApiResponse::created(created))
}

/// Put a repaired unit back in circulation
#[utoipa::path(
    put,
    path = "/products/{id}/units/repairs",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = RepairUnit,
    responses(
        (status = 200, description = "Unit available again", body = ProductUnit),
        (status = 409, description = "Unit is not in maintenance", body = crate::error::ErrorResponse)
    )
)]
pub async fn repair_unit(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(repair), _): JsonBody<RepairUnit>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;

    let unit = state.services.catalog.repair_unit(id, &repair).await?;
    Ok(ApiResponse::ok(unit))
}

/// Retire a unit
#[utoipa::path(
    delete,
    path = "/products/{id}/units/retire",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = RetireUnit,
    responses(
        (status = 200, description = "Unit retired", body = ProductUnit),
        (status = 404, description = "Unit not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Unit is on loan or already retired", body = crate::error::ErrorResponse)
    )
)]
pub async fn retire_unit(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(request), _): JsonBody<RetireUnit>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;

    let unit = state.services.catalog.retire_unit(id, request.unit_id).await?;
    Ok(ApiResponse::ok(unit).with_message("Unit retired"))
}
