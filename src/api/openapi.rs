//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, categories, dashboard, health, loans, products, users};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wisma API",
        version = "1.0.0",
        description = "Item loan management REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::update_role,
        users::delete_user,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Products
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_units,
        products::add_unit,
        products::repair_unit,
        products::retire_unit,
        // Loans
        loans::create_loan,
        loans::list_loans,
        loans::loan_history,
        loans::check_loan,
        loans::get_loan,
        loans::update_loan_items,
        loans::approve_loan,
        loans::reject_loan,
        loans::return_loan,
        loans::complete_loan,
        // Dashboard
        dashboard::get_stats,
    ),
    components(
        schemas(
            // Auth
            crate::models::auth::LoginRequest,
            crate::models::auth::LoginResponse,
            crate::models::auth::RefreshTokenRequest,
            crate::models::auth::TokenPair,
            // Users
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::RegisterUser,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            crate::models::user::UpdateRole,
            // Catalog
            crate::models::category::Category,
            crate::models::category::CategoryPayload,
            crate::models::product::Product,
            crate::models::product::ProductDetails,
            crate::models::product::ProductUnit,
            crate::models::product::UnitStatus,
            crate::models::product::UnitCondition,
            crate::models::product::ProductSort,
            crate::models::product::SortOrder,
            crate::models::product::CreateProduct,
            crate::models::product::CreateUnit,
            crate::models::product::UpdateProduct,
            crate::models::product::RetireUnit,
            crate::models::product::RepairUnit,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanItem,
            crate::models::loan::LoanParticipant,
            crate::models::loan::ParticipantRole,
            crate::models::loan::LoanHistoryEntry,
            crate::models::loan::Report,
            crate::models::loan::ReportPayload,
            crate::models::loan::CreateLoan,
            crate::models::loan::LoanItemRequest,
            crate::models::loan::UpdateLoanItems,
            crate::models::loan::ReturnLoan,
            crate::models::loan::CompleteLoan,
            crate::models::loan::LoanCheck,
            // Dashboard
            crate::models::stats::DashboardStats,
            crate::models::stats::StatEntry,
            // Health
            health::HealthResponse,
            // Envelopes
            crate::api::response::SuccessBody,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management"),
        (name = "categories", description = "Product categories"),
        (name = "products", description = "Products and their units"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "dashboard", description = "Admin dashboard")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
