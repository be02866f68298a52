//! Categories repository

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::category::Category,
};

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

fn duplicate_name(name: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| {
        if is_unique_violation(&e) {
            AppError::Validation(format!("category_name: {} already exists", name))
        } else {
            e.into()
        }
    }
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories ORDER BY category_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE category_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn create(&self, name: &str) -> AppResult<Category> {
        let now = Utc::now();

        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (category_id, category_name, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_name(name))
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET category_name = $1, updated_at = $2 WHERE category_id = $3 RETURNING *",
        )
        .bind(name)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_name(name))?
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    /// Delete a category no product refers to
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>(
            "SELECT category_id FROM categories WHERE category_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))?;

        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE category_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if in_use {
            return Err(AppError::Conflict(
                "Category is still used by products".to_string(),
            ));
        }

        sqlx::query("DELETE FROM categories WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
