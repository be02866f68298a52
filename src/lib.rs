//! Wisma Item Loan Management System
//!
//! REST JSON API for lending serialized equipment inside an organization:
//! users and roles, a product catalog made of individually tracked units,
//! and a loan lifecycle approved by staff.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::{Pool, Postgres};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repository::Repository;
use services::Services;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
    pub pool: Pool<Postgres>,
}

impl AppState {
    /// Wire repositories and services on top of a pool
    pub fn new(config: AppConfig, pool: Pool<Postgres>) -> Self {
        let repository = Repository::new(pool.clone());
        let services = Services::new(repository, config.auth.clone());

        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            pool,
        }
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/refresh", put(api::auth::refresh))
        .route("/auth/logout", delete(api::auth::logout))
        .route("/auth/me", get(api::auth::me))
        // Users
        .route("/users", get(api::users::list_users).post(api::users::create_user))
        .route(
            "/users/:id",
            get(api::users::get_user)
                .patch(api::users::update_user)
                .delete(api::users::delete_user),
        )
        .route("/users/:id/role", put(api::users::update_role))
        // Categories
        .route(
            "/category",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        .route(
            "/category/:id",
            get(api::categories::get_category)
                .put(api::categories::update_category)
                .delete(api::categories::delete_category),
        )
        // Products
        .route(
            "/products",
            get(api::products::list_products).post(api::products::create_product),
        )
        .route(
            "/products/:id",
            get(api::products::get_product)
                .patch(api::products::update_product)
                .delete(api::products::delete_product),
        )
        .route(
            "/products/:id/units",
            get(api::products::list_units).post(api::products::add_unit),
        )
        .route("/products/:id/units/repairs", put(api::products::repair_unit))
        .route("/products/:id/units/retire", delete(api::products::retire_unit))
        // Loans
        .route("/loan", get(api::loans::list_loans).post(api::loans::create_loan))
        .route("/loan/history", get(api::loans::loan_history))
        .route("/loan/check", get(api::loans::check_loan))
        .route("/loan/:id", get(api::loans::get_loan))
        .route("/loan/:id/items", put(api::loans::update_loan_items))
        .route("/loan/:id/approve", patch(api::loans::approve_loan))
        .route("/loan/:id/reject", patch(api::loans::reject_loan))
        .route("/loan/:id/return", post(api::loans::return_loan))
        .route("/loan/:id/returned", patch(api::loans::complete_loan))
        // Dashboard
        .route("/dashboard/stats", get(api::dashboard::get_stats))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .with_state(state.clone());

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .fallback(api::route_not_found)
        .layer(TimeoutLayer::new(state.config.server.request_timeout()))
        .layer(middleware::map_response(api::envelope_bare_errors))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
