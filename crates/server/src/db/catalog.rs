//! Catalog and stock repositories.
//!
//! Stock changes are single `UPDATE` statements so the check and the write
//! happen under the same row lock:
//!
//! ```sql
//! UPDATE shop.product SET stock = stock - $2 WHERE id = $1 AND stock >= $2
//! ```
//!
//! Concurrent reservations on one product queue on that row; reservations on
//! different products never touch the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use shopfront_core::{CategoryId, Money, ProductId};

use super::{conflict_on_unique, count_from_db, count_to_db};
use crate::models::{Category, NewCategory, NewProduct, Product};
use crate::store::{Catalog, Reservation, StockLedger, StoreError};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Money,
    stock: i32,
    category_id: Option<CategoryId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: count_from_db(row.stock, "stock")?,
            category_id: row.category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for `shop.category` and `shop.product` reads.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a category, or update the description of an existing one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn upsert_category(&self, category: &NewCategory) -> Result<Category, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO shop.category (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            RETURNING id, name, description, created_at
            ",
        )
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Find a category by exact name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, created_at FROM shop.category WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a product with the same name exists.
    pub async fn insert_product(
        &self,
        product: &NewProduct,
        category_id: Option<CategoryId>,
    ) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO shop.product (name, description, price, stock, category_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, stock, category_id, created_at, updated_at
            ",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(count_to_db(product.stock)?)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product"))?;

        Product::try_from(row)
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock, category_id, created_at, updated_at
            FROM shop.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, created_at FROM shop.category WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn list_low_stock(&self, threshold: u32) -> Result<Vec<Product>, StoreError> {
        // Anything beyond i32::MAX is above every stored stock anyway.
        let threshold = i32::try_from(threshold).unwrap_or(i32::MAX);
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock, category_id, created_at, updated_at
            FROM shop.product
            WHERE stock < $1
            ORDER BY stock, id
            ",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Product::try_from)
        .collect()
    }
}

/// Reserve stock on whichever connection (pool or open transaction) the caller holds.
pub(super) async fn reserve_on(
    conn: &mut PgConnection,
    product: ProductId,
    quantity: u32,
) -> Result<Reservation, StoreError> {
    let wanted = count_to_db(quantity)?;

    let reserved = sqlx::query_as::<_, (i32, Money)>(
        r"
        UPDATE shop.product
        SET stock = stock - $2, updated_at = now()
        WHERE id = $1 AND stock >= $2
        RETURNING stock, price
        ",
    )
    .bind(product)
    .bind(wanted)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((remaining, unit_price)) = reserved {
        return Ok(Reservation::Reserved {
            remaining: count_from_db(remaining, "stock")?,
            unit_price,
        });
    }

    let current = sqlx::query_scalar::<_, i32>("SELECT stock FROM shop.product WHERE id = $1")
        .bind(product)
        .fetch_optional(&mut *conn)
        .await?;

    match current {
        None => Ok(Reservation::UnknownProduct),
        Some(stock) => Ok(Reservation::Insufficient {
            // Stock may have grown since the UPDATE; still report at least one unit short.
            shortfall: quantity
                .saturating_sub(count_from_db(stock, "stock")?)
                .max(1),
        }),
    }
}

/// Autocommit stock mutations.
#[derive(Debug, Clone)]
pub struct PgStock {
    pool: PgPool,
}

impl PgStock {
    /// Create a new stock repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockLedger for PgStock {
    #[instrument(skip(self))]
    async fn reserve(
        &self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Reservation, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reserve_on(&mut conn, product, quantity).await
    }

    #[instrument(skip(self))]
    async fn restock(&self, product: ProductId, quantity: u32) -> Result<Option<u32>, StoreError> {
        let stock = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE shop.product
            SET stock = stock + $2, updated_at = now()
            WHERE id = $1
            RETURNING stock
            ",
        )
        .bind(product)
        .bind(count_to_db(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        stock.map(|s| count_from_db(s, "stock")).transpose()
    }
}
