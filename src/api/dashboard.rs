//! Dashboard endpoint

use axum::extract::State;

use crate::{
    error::AppResult,
    models::{stats::DashboardStats, user::ADMINS},
};

use super::{ApiResponse, AuthenticatedUser};

/// Counts for the admin dashboard
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 403, description = "Insufficient rights", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;

    let stats = state.services.stats.dashboard().await?;
    Ok(ApiResponse::ok(stats))
}
