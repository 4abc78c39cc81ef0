//! `PostgreSQL` repositories.
//!
//! # Schema: `shop`
//!
//! ## Tables
//!
//! - `principal` - Accounts (customers and admins), unique on `lower(email)`
//! - `session_token` - One row per live session, unique on `principal_id`
//! - `category`, `product` - Catalog; `product.stock` is `CHECK (stock >= 0)`
//! - `customer_order`, `order_item` - Orders, unique on `tracking_id`
//! - `activity_log` - Append-only audit trail
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as`) so the crate builds
//! without a live database.

mod activity;
mod catalog;
mod orders;
mod principals;
mod tokens;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub use activity::PgActivityLog;
pub use catalog::{PgCatalog, PgStock};
pub use orders::PgOrders;
pub use principals::PgPrincipals;
pub use tokens::PgTokens;

use crate::store::{HealthCheck, StoreError};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Both acquiring a connection and every statement are bounded by
/// `storage_timeout`, so a wedged database surfaces as an error rather than
/// a hung request.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `storage_timeout` - Upper bound for pool acquisition and statements
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    storage_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let options: PgConnectOptions = database_url.expose_secret().parse()?;
    let options = options.options([(
        "statement_timeout",
        storage_timeout.as_millis().to_string(),
    )]);

    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(storage_timeout)
        .connect_with(options)
        .await
}

/// Readiness probe over the pool.
#[derive(Debug, Clone)]
pub struct PgHealth {
    pool: PgPool,
}

impl PgHealth {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PgHealth {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Conversions shared by the repositories
// =============================================================================

/// Map a unique violation to `StoreError::Conflict`, anything else to `Database`.
fn conflict_on_unique(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Database(err)
}

/// Stock and quantities are `int` columns guarded by `CHECK (>= 0)`.
fn count_from_db(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::DataCorruption(format!("negative {column} in database: {value}")))
}

fn count_to_db(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Conflict(format!("quantity out of range: {value}")))
}

fn email_from_db(value: &str) -> Result<shopfront_core::Email, StoreError> {
    shopfront_core::Email::parse(value)
        .map_err(|e| StoreError::DataCorruption(format!("invalid email in database: {e}")))
}
