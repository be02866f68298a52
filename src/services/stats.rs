//! Dashboard statistics service

use crate::{
    error::AppResult,
    models::{
        loan::Loan,
        stats::{DashboardStats, StatEntry},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    async fn group_count(&self, table: &str, column: &str) -> AppResult<Vec<StatEntry>> {
        let sql = format!(
            "SELECT {column} AS label, COUNT(*) AS count FROM {table} GROUP BY {column} ORDER BY {column}"
        );
        let entries = sqlx::query_as::<_, StatEntry>(&sql)
            .fetch_all(&self.repository.pool)
            .await?;
        Ok(entries)
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let pool = &self.repository.pool;

        let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(pool)
            .await?;
        let total_categories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(pool)
            .await?;

        let pending_loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE status = 'REQUESTED' ORDER BY created_at DESC LIMIT 5",
        )
        .fetch_all(pool)
        .await?;

        Ok(DashboardStats {
            total_products,
            total_categories,
            units_by_status: self.group_count("product_units", "status").await?,
            users_by_role: self.group_count("users", "role").await?,
            loans_by_status: self.group_count("loans", "status").await?,
            pending_loans,
        })
    }
}
