//! Catalog domain types.
//!
//! The catalog is read-only from the point of view of order fulfillment;
//! stock changes go through the inventory ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{CategoryId, Money, ProductId};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A sellable product with its current price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Current unit price. Orders snapshot this at reservation time.
    pub price: Money,
    /// Units on hand. Never negative.
    pub stock: u32,
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting a category (seeding).
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Data for inserting a product (seeding).
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
    /// Category name; resolved to an id when seeding.
    #[serde(default)]
    pub category: Option<String>,
}
