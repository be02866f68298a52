//! Product and product unit (serialized physical item) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::category::Category;

/// Availability of a single unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitStatus {
    Available,
    /// Held by a loan awaiting approval
    Reserved,
    Loaned,
    /// Reported damaged, waiting for repair
    Maintenance,
    Retired,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "AVAILABLE",
            UnitStatus::Reserved => "RESERVED",
            UnitStatus::Loaned => "LOANED",
            UnitStatus::Maintenance => "MAINTENANCE",
            UnitStatus::Retired => "RETIRED",
        }
    }

    /// Unit is held by an active loan
    pub fn is_held(&self) -> bool {
        matches!(self, UnitStatus::Reserved | UnitStatus::Loaned)
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Ok(UnitStatus::Available),
            "RESERVED" => Ok(UnitStatus::Reserved),
            "LOANED" => Ok(UnitStatus::Loaned),
            "MAINTENANCE" => Ok(UnitStatus::Maintenance),
            "RETIRED" => Ok(UnitStatus::Retired),
            _ => Err(format!("Invalid unit status: {}", s)),
        }
    }
}

impl_text_type!(UnitStatus);

/// Physical condition of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitCondition {
    Good,
    Damaged,
}

impl UnitCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitCondition::Good => "GOOD",
            UnitCondition::Damaged => "DAMAGED",
        }
    }
}

impl std::fmt::Display for UnitCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UnitCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GOOD" => Ok(UnitCondition::Good),
            "DAMAGED" => Ok(UnitCondition::Damaged),
            _ => Err(format!("Invalid unit condition: {}", s)),
        }
    }
}

impl_text_type!(UnitCondition);

/// Product model with its derived availability
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: Option<String>,
    pub category_id: Uuid,
    /// Number of units in circulation (retired units excluded)
    pub quantity: i32,
    /// Number of units currently AVAILABLE
    pub available: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product with category and units
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub units: Vec<ProductUnit>,
}

/// A single serialized physical item
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ProductUnit {
    pub unit_id: Uuid,
    pub product_id: Uuid,
    pub serial_number: String,
    pub condition: UnitCondition,
    pub status: UnitStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sortable product columns
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    ProductName,
    Quantity,
    #[default]
    CreatedAt,
}

impl ProductSort {
    pub fn column(&self) -> &'static str {
        match self {
            ProductSort::ProductName => "p.product_name",
            ProductSort::Quantity => "p.quantity",
            ProductSort::CreatedAt => "p.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Product list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ProductQuery {
    /// Case-insensitive name filter
    pub product_name: Option<String>,
    pub sort: Option<ProductSort>,
    pub order: Option<SortOrder>,
}

/// Unit list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct UnitQuery {
    pub status: Option<UnitStatus>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUnit {
    #[validate(length(min = 1, max = 100, message = "Serial number is required"))]
    pub serial_number: String,
}

/// Create product request. Quantity is the number of units supplied.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub product_name: String,
    pub product_image: Option<String>,
    pub category_id: Uuid,
    #[validate(length(min = 1, message = "At least one unit is required"), nested)]
    pub units: Vec<CreateUnit>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 200, message = "Product name must not be empty"))]
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RetireUnit {
    pub unit_id: Uuid,
}

/// Mark a unit as repaired (or re-inspected) and put it back in circulation
#[derive(Debug, Deserialize, ToSchema)]
pub struct RepairUnit {
    pub unit_id: Uuid,
    pub condition: UnitCondition,
    pub note: Option<String>,
}
