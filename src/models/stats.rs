//! Dashboard statistics

use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::loan::Loan;

/// Count for one value of a status-like column
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct StatEntry {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_products: i64,
    pub total_categories: i64,
    pub units_by_status: Vec<StatEntry>,
    pub users_by_role: Vec<StatEntry>,
    pub loans_by_status: Vec<StatEntry>,
    /// Most recent requests awaiting a decision
    pub pending_loans: Vec<Loan>,
}
