//! Catalog management service: categories, products and their units

use uuid::Uuid;

use crate::{
    error::{not_found_as_none, AppResult},
    models::{
        category::Category,
        product::{
            CreateProduct, Product, ProductDetails, ProductQuery, ProductUnit, RepairUnit,
            UnitStatus, UpdateProduct,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, name: &str) -> AppResult<Category> {
        let category = self.repository.categories.create(name.trim()).await?;
        tracing::info!(category_id = %category.category_id, "Category created");
        Ok(category)
    }

    pub async fn rename_category(&self, id: Uuid, name: &str) -> AppResult<Category> {
        self.repository.categories.rename(id, name.trim()).await
    }

    pub async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        self.repository.categories.delete(id).await?;
        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }

    /// Search products
    pub async fn list_products(&self, query: &ProductQuery) -> AppResult<Vec<Product>> {
        self.repository.products.list(query).await
    }

    /// Get product with category and units
    pub async fn get_product(&self, id: Uuid) -> AppResult<ProductDetails> {
        let product = self.repository.products.get_by_id(id).await?;
        let category = not_found_as_none(self.repository.categories.get_by_id(product.category_id).await)?;
        let units = self.repository.products.list_units(id, None).await?;

        Ok(ProductDetails {
            product,
            category,
            units,
        })
    }

    pub async fn create_product(&self, product: &CreateProduct) -> AppResult<Product> {
        let created = self.repository.products.create(product).await?;
        tracing::info!(
            product_id = %created.product_id,
            units = created.quantity,
            "Product created"
        );
        Ok(created)
    }

    pub async fn update_product(&self, id: Uuid, product: &UpdateProduct) -> AppResult<Product> {
        self.repository.products.update(id, product).await
    }

    pub async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        self.repository.products.delete(id).await?;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Units of a product, optionally filtered by status
    pub async fn list_units(&self, product_id: Uuid, status: Option<UnitStatus>) -> AppResult<Vec<ProductUnit>> {
        // 404 for an unknown product rather than an empty list
        self.repository.products.get_by_id(product_id).await?;
        self.repository.products.list_units(product_id, status).await
    }

    pub async fn add_unit(&self, product_id: Uuid, serial_number: &str) -> AppResult<ProductUnit> {
        let unit = self
            .repository
            .products
            .add_unit(product_id, serial_number.trim())
            .await?;
        tracing::info!(product_id = %product_id, unit_id = %unit.unit_id, "Unit added");
        Ok(unit)
    }

    pub async fn repair_unit(&self, product_id: Uuid, repair: &RepairUnit) -> AppResult<ProductUnit> {
        let unit = self.repository.products.repair_unit(product_id, repair).await?;
        tracing::info!(
            unit_id = %unit.unit_id,
            condition = %unit.condition,
            "Unit back in circulation"
        );
        Ok(unit)
    }

    pub async fn retire_unit(&self, product_id: Uuid, unit_id: Uuid) -> AppResult<ProductUnit> {
        let unit = self.repository.products.retire_unit(product_id, unit_id).await?;
        tracing::info!(product_id = %product_id, unit_id = %unit_id, "Unit retired");
        Ok(unit)
    }
}
