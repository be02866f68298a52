//! Authentication endpoints

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        auth::{LoginRequest, LoginResponse, RefreshTokenRequest, TokenPair},
        user::{RegisterUser, User},
    },
};

use super::{ApiResponse, AuthenticatedUser, JsonBody};

/// Register a new borrower account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 400, description = "Invalid data or username taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    WithRejection(Json(request), _): JsonBody<RegisterUser>,
) -> AppResult<ApiResponse> {
    request.validate()?;

    let user = state.services.auth.register(request).await?;
    Ok(ApiResponse::created(serde_json::json!({ "user": user })))
}

/// Authenticate with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> AppResult<ApiResponse> {
    request.validate()?;

    let session = state
        .services
        .auth
        .login(&request.username, &request.password)
        .await?;

    Ok(ApiResponse::ok(session))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    put,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = TokenPair),
        (status = 400, description = "Refresh token is not valid", body = crate::error::ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<crate::AppState>,
    WithRejection(Json(request), _): JsonBody<RefreshTokenRequest>,
) -> AppResult<ApiResponse> {
    request.validate()?;

    let tokens = state.services.auth.refresh(&request.refresh_token).await?;
    Ok(ApiResponse::ok(tokens))
}

/// Revoke a refresh token
#[utoipa::path(
    delete,
    path = "/auth/logout",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Logged out"),
        (status = 400, description = "Refresh token is not valid", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<crate::AppState>,
    WithRejection(Json(request), _): JsonBody<RefreshTokenRequest>,
) -> AppResult<ApiResponse> {
    request.validate()?;

    state.services.auth.logout(&request.refresh_token).await?;
    Ok(ApiResponse::message("Refresh token deleted"))
}

/// Get current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse> {
    let user = state.services.auth.me(&claims).await?;
    Ok(ApiResponse::ok(user))
}
