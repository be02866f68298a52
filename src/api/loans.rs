//! Loan lifecycle endpoints

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
        loan::{
            CompleteLoan, CreateLoan, Loan, LoanCheck, LoanDetails, LoanHistoryEntry, LoanQuery,
            ReturnLoan, UpdateLoanItems,
        },
        user::{ADMINS, ANY},
    },
};

use super::{ApiResponse, AuthenticatedUser, JsonBody, OptionalJson, PathParam, QueryParams};

/// Request a loan
#[utoipa::path(
    post,
    path = "/loan",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan requested", body = LoanDetails),
        (status = 403, description = "Only borrowers can request loans", body = crate::error::ErrorResponse),
        (status = 404, description = "Unit, product or user not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Unit unavailable or an active loan exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<CreateLoan>,
) -> AppResult<ApiResponse> {
    request.validate()?;

    let loan = state.services.loans.create(&claims, &request).await?;
    Ok(ApiResponse::created(loan))
}

/// List all loans
#[utoipa::path(
    get,
    path = "/loan",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = Vec<Loan>),
        (status = 403, description = "Insufficient rights", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Query(query), _): QueryParams<LoanQuery>,
) -> AppResult<ApiResponse> {
    claims.authorize(ADMINS)?;

    let loans = state.services.loans.list(query.status).await?;
    Ok(ApiResponse::ok(loans))
}

/// Loans the caller takes part in
#[utoipa::path(
    get,
    path = "/loan/history",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Loan history", body = Vec<LoanHistoryEntry>))
)]
pub async fn loan_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse> {
    claims.authorize(ANY)?;

    let history = state.services.loans.history(&claims).await?;
    Ok(ApiResponse::ok(history))
}

/// Whether the caller can request a new loan
#[utoipa::path(
    get,
    path = "/loan/check",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Eligibility", body = LoanCheck))
)]
pub async fn check_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<ApiResponse> {
    let check = state.services.loans.check(&claims).await?;
    Ok(ApiResponse::ok(check))
}

/// Loan details (owner or staff)
#[utoipa::path(
    get,
    path = "/loan/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Access denied", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    let loan = state.services.loans.get(&claims, id).await?;
    Ok(ApiResponse::ok(loan))
}

/// Replace the items of a requested loan
#[utoipa::path(
    put,
    path = "/loan/{id}/items",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body = UpdateLoanItems,
    responses(
        (status = 200, description = "Loan items updated", body = LoanDetails),
        (status = 403, description = "Admins only", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan or product not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan is not REQUESTED or not enough units", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_loan_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    WithRejection(Json(request), _): JsonBody<UpdateLoanItems>,
) -> AppResult<ApiResponse> {
    request.validate()?;

    let loan = state.services.loans.update_items(&claims, id, &request).await?;
    Ok(ApiResponse::ok(loan).with_message("Loan items updated"))
}

/// Approve a requested loan
#[utoipa::path(
    patch,
    path = "/loan/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan approved", body = LoanDetails),
        (status = 409, description = "Loan is not REQUESTED", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    let loan = state.services.loans.approve(&claims, id).await?;
    Ok(ApiResponse::ok(loan).with_message("Loan approved"))
}

/// Reject a requested loan
#[utoipa::path(
    patch,
    path = "/loan/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan rejected", body = LoanDetails),
        (status = 409, description = "Loan is not REQUESTED", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
) -> AppResult<ApiResponse> {
    let loan = state.services.loans.reject(&claims, id).await?;
    Ok(ApiResponse::ok(loan).with_message("Loan rejected"))
}

/// Return the units of an approved loan
#[utoipa::path(
    post,
    path = "/loan/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body = ReturnLoan,
    responses(
        (status = 200, description = "Loan returned", body = LoanDetails),
        (status = 403, description = "Access denied", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan is not APPROVED", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    OptionalJson(request): OptionalJson<ReturnLoan>,
) -> AppResult<ApiResponse> {
    request.validate()?;

    let loan = state.services.loans.return_loan(&claims, id, &request).await?;
    Ok(ApiResponse::ok(loan).with_message("Loan returned"))
}

/// Confirm the return and close the loan
#[utoipa::path(
    patch,
    path = "/loan/{id}/returned",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body = CompleteLoan,
    responses(
        (status = 200, description = "Loan done", body = LoanDetails),
        (status = 409, description = "Loan is not APPROVED or RETURNED", body = crate::error::ErrorResponse)
    )
)]
pub async fn complete_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): PathParam<Uuid>,
    OptionalJson(request): OptionalJson<CompleteLoan>,
) -> AppResult<ApiResponse> {
    let loan = state.services.loans.complete(&claims, id, &request).await?;
    Ok(ApiResponse::ok(loan).with_message("Loan done"))
}
