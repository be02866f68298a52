//! Products and product units repository

use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::product::{
        CreateProduct, Product, ProductQuery, ProductUnit, RepairUnit, UnitCondition, UnitStatus,
        UpdateProduct,
    },
};

const PRODUCT_COLUMNS: &str = r#"
    p.*,
    (SELECT COUNT(*) FROM product_units u
     WHERE u.product_id = p.product_id AND u.status = 'AVAILABLE') AS available
"#;

/// Map unique violations on product names and serial numbers to validation errors
fn map_unique(e: sqlx::Error) -> AppError {
    let constraint = e
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .and_then(|db| db.constraint().map(str::to_string));

    match constraint.as_deref() {
        Some("products_product_name_key") => {
            AppError::Validation("product_name: a product with this name already exists".to_string())
        }
        Some("product_units_serial_number_key") => {
            AppError::Validation("serial_number: serial number already registered".to_string())
        }
        _ => e.into(),
    }
}

#[derive(Clone)]
pub struct ProductsRepository {
    pool: Pool<Postgres>,
}

impl ProductsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List products with optional name filter and whitelisted sorting
    pub async fn list(&self, query: &ProductQuery) -> AppResult<Vec<Product>> {
        let sort = query.sort.unwrap_or_default();
        let order = query.order.unwrap_or_default();

        let sql = format!(
            r#"
            SELECT {}
            FROM products p
            WHERE ($1::text IS NULL OR p.product_name ILIKE '%' || $1 || '%')
            ORDER BY {} {}, p.product_id
            "#,
            PRODUCT_COLUMNS,
            sort.column(),
            order.as_sql()
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(query.product_name.as_deref().filter(|s| !s.trim().is_empty()))
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Get product by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Product> {
        let sql = format!("SELECT {} FROM products p WHERE p.product_id = $1", PRODUCT_COLUMNS);

        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product with id {} not found", id)))
    }

    async fn ensure_category(tx: &mut Transaction<'_, Postgres>, category_id: Uuid) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE category_id = $1)",
        )
        .bind(category_id)
        .fetch_one(&mut **tx)
        .await?;

        if !exists {
            return Err(AppError::NotFound(format!(
                "Category with id {} not found",
                category_id
            )));
        }
        Ok(())
    }

    /// Lock a product row, failing when it does not exist
    async fn lock_product(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<()> {
        sqlx::query_scalar::<_, Uuid>("SELECT product_id FROM products WHERE product_id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product with id {} not found", id)))?;
        Ok(())
    }

    async fn lock_unit(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        unit_id: Uuid,
    ) -> AppResult<ProductUnit> {
        sqlx::query_as::<_, ProductUnit>(
            "SELECT * FROM product_units WHERE unit_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(unit_id)
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unit with id {} not found", unit_id)))
    }

    async fn insert_unit(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        serial_number: &str,
    ) -> AppResult<ProductUnit> {
        let now = Utc::now();

        sqlx::query_as::<_, ProductUnit>(
            r#"
            INSERT INTO product_units (unit_id, product_id, serial_number, condition, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(serial_number)
        .bind(UnitCondition::Good)
        .bind(UnitStatus::Available)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_unique)
    }

    /// Create a product together with its initial units
    pub async fn create(&self, product: &CreateProduct) -> AppResult<Product> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let product_id = Uuid::new_v4();

        Self::ensure_category(&mut tx, product.category_id).await?;

        sqlx::query(
            r#"
            INSERT INTO products (product_id, product_name, product_image, category_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(product_id)
        .bind(&product.product_name)
        .bind(&product.product_image)
        .bind(product.category_id)
        .bind(product.units.len() as i32)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        for unit in &product.units {
            Self::insert_unit(&mut tx, product_id, &unit.serial_number).await?;
        }

        tx.commit().await?;

        self.get_by_id(product_id).await
    }

    /// Update product fields
    pub async fn update(&self, id: Uuid, product: &UpdateProduct) -> AppResult<Product> {
        let mut tx = self.pool.begin().await?;

        Self::lock_product(&mut tx, id).await?;
        if let Some(category_id) = product.category_id {
            Self::ensure_category(&mut tx, category_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE products SET
                product_name = COALESCE($1, product_name),
                product_image = COALESCE($2, product_image),
                category_id = COALESCE($3, category_id),
                updated_at = $4
            WHERE product_id = $5
            "#,
        )
        .bind(&product.product_name)
        .bind(&product.product_image)
        .bind(product.category_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Delete a product with no held units and no loan history
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        Self::lock_product(&mut tx, id).await?;

        let held: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM product_units WHERE product_id = $1 AND status IN ('RESERVED', 'LOANED'))",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if held {
            return Err(AppError::Conflict(
                "Product has units on loan and cannot be deleted".to_string(),
            ));
        }

        let has_history: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loan_items WHERE product_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if has_history {
            return Err(AppError::Conflict(
                "Product has loan history and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM product_units WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// List units of a product, optionally filtered by status
    pub async fn list_units(&self, product_id: Uuid, status: Option<UnitStatus>) -> AppResult<Vec<ProductUnit>> {
        let units = sqlx::query_as::<_, ProductUnit>(
            r#"
            SELECT * FROM product_units
            WHERE product_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY serial_number
            "#,
        )
        .bind(product_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    /// Register a new unit and grow the product quantity
    pub async fn add_unit(&self, product_id: Uuid, serial_number: &str) -> AppResult<ProductUnit> {
        let mut tx = self.pool.begin().await?;

        Self::lock_product(&mut tx, product_id).await?;
        let unit = Self::insert_unit(&mut tx, product_id, serial_number).await?;

        sqlx::query("UPDATE products SET quantity = quantity + 1, updated_at = $1 WHERE product_id = $2")
            .bind(Utc::now())
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(unit)
    }

    /// Take a unit out of circulation for good
    pub async fn retire_unit(&self, product_id: Uuid, unit_id: Uuid) -> AppResult<ProductUnit> {
        let mut tx = self.pool.begin().await?;

        Self::lock_product(&mut tx, product_id).await?;
        let unit = Self::lock_unit(&mut tx, product_id, unit_id).await?;

        if unit.status == UnitStatus::Retired {
            return Err(AppError::Conflict("Unit is already retired".to_string()));
        }
        if unit.status.is_held() {
            return Err(AppError::Conflict(format!(
                "Unit is {} and cannot be retired",
                unit.status
            )));
        }

        let now = Utc::now();

        let unit = sqlx::query_as::<_, ProductUnit>(
            "UPDATE product_units SET status = $1, updated_at = $2 WHERE unit_id = $3 RETURNING *",
        )
        .bind(UnitStatus::Retired)
        .bind(now)
        .bind(unit_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE products SET quantity = GREATEST(quantity - 1, 0), updated_at = $1 WHERE product_id = $2",
        )
        .bind(now)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(unit)
    }

    /// Put a unit in maintenance (or an idle one) back into circulation
    pub async fn repair_unit(&self, product_id: Uuid, repair: &RepairUnit) -> AppResult<ProductUnit> {
        let mut tx = self.pool.begin().await?;

        let unit = Self::lock_unit(&mut tx, product_id, repair.unit_id).await?;

        if !matches!(unit.status, UnitStatus::Maintenance | UnitStatus::Available) {
            return Err(AppError::Conflict(format!(
                "Unit is {} and cannot be repaired",
                unit.status
            )));
        }

        let unit = sqlx::query_as::<_, ProductUnit>(
            r#"
            UPDATE product_units SET
                status = $1,
                condition = $2,
                note = COALESCE($3, note),
                updated_at = $4
            WHERE unit_id = $5
            RETURNING *
            "#,
        )
        .bind(UnitStatus::Available)
        .bind(repair.condition)
        .bind(&repair.note)
        .bind(Utc::now())
        .bind(repair.unit_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(unit)
    }
}
