//! API handlers for Wisma REST endpoints

pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod products;
pub mod response;
pub mod users;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    extract::WithRejection,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::de::DeserializeOwned;

use crate::{error::AppError, models::user::UserClaims, AppState};

pub use response::ApiResponse;

/// JSON body whose rejections use the fail envelope
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;
/// Path parameters whose rejections use the fail envelope
pub type PathParam<T> = WithRejection<Path<T>, AppError>;
/// Query string whose rejections use the fail envelope
pub type QueryParams<T> = WithRejection<Query<T>, AppError>;

/// Extractor for the authenticated caller, resolved from the bearer token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Authentication("Missing or malformed authorization header".to_string())
                })?;

        let claims = state.services.auth.verify_access_token(bearer.token())?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Fallback for paths no route matches
pub async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// Wrap the bodiless 405 and 408 responses produced by the router and the
/// timeout layer in the fail envelope. The `Allow` header is kept.
pub async fn envelope_bare_errors(response: Response) -> Response {
    if response.headers().contains_key(header::CONTENT_TYPE) {
        return response;
    }

    let error = match response.status() {
        StatusCode::METHOD_NOT_ALLOWED => AppError::MethodNotAllowed("Method not allowed".to_string()),
        StatusCode::REQUEST_TIMEOUT => AppError::Timeout("Request timed out".to_string()),
        _ => return response,
    };

    let mut enveloped = error.into_response();
    if let Some(allow) = response.headers().get(header::ALLOW) {
        enveloped.headers_mut().insert(header::ALLOW, allow.clone());
    }
    enveloped
}

/// JSON body that may be omitted entirely; an empty body yields `T::default()`
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge("Request body is too large".to_string())
            } else {
                AppError::BadRequest(rejection.body_text())
            }
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(OptionalJson)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
    }
}
