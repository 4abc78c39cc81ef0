//! Storage capabilities consumed by the services.
//!
//! Every piece of shared mutable state (principals, session tokens, stock
//! counters, orders, the activity log) is reached through one of the traits
//! below and handed to the services as an `Arc<dyn ...>`. Two backends exist:
//!
//! - [`crate::db`] - `PostgreSQL` repositories (production)
//! - [`memory::MemoryStore`] - in-process fake used by tests and local demos
//!
//! Services never call a store directly; they go through [`bounded`] so a
//! stuck connection surfaces as [`StoreError::Timeout`] instead of hanging
//! the request.

pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use shopfront_core::{
    CategoryId, Email, Money, OrderId, OrderStatus, PrincipalId, ProductId, Role, TrackingId,
};

use crate::models::{
    ActivityLog, Category, NewActivity, NewOrder, NewPrincipal, Order, Page, PageRequest,
    Principal, Product, SessionToken,
};

// =============================================================================
// Errors
// =============================================================================

/// Errors produced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., unique email, duplicate tracking id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The storage call did not finish within the configured bound.
    #[error("storage call timed out")]
    Timeout,
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            Self::DataCorruption(_) | Self::Conflict(_) => false,
        }
    }
}

/// Run a storage future with an upper bound on its duration.
///
/// # Errors
///
/// Returns `StoreError::Timeout` if `fut` does not complete within `limit`,
/// otherwise whatever `fut` returns.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a single-product reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Stock was decremented.
    Reserved {
        /// Stock left after the decrement.
        remaining: u32,
        /// Product price at the moment the row was locked.
        unit_price: Money,
    },
    /// Not enough stock; nothing was changed.
    Insufficient {
        /// Units missing to satisfy the request.
        shortfall: u32,
    },
    /// No product with that id.
    UnknownProduct,
}

/// Result of a conditional status update.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// The status was changed (and stock released, if requested).
    Applied(Order),
    /// No order with that id.
    NotFound,
    /// The order was no longer in the expected status.
    Stale {
        /// Status found at update time.
        current: OrderStatus,
    },
}

// =============================================================================
// Capabilities
// =============================================================================

/// Principal (user account) lookup and persistence.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Get a principal by id.
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError>;

    /// Get a principal by email (emails are stored lowercase).
    async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError>;

    /// Get a principal together with its password hash, for login.
    async fn find_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Principal, String)>, StoreError>;

    /// Insert a principal.
    ///
    /// Returns `StoreError::Conflict` if the email is taken.
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError>;

    /// List principals, optionally filtered by role, oldest first.
    async fn list(&self, role: Option<Role>) -> Result<Vec<Principal>, StoreError>;

    /// Delete a principal and, by cascade, its session token.
    async fn delete(&self, id: PrincipalId) -> Result<bool, StoreError>;

    /// Whether at least one admin principal exists.
    async fn any_admin_exists(&self) -> Result<bool, StoreError>;
}

/// Session token table. Owned exclusively by the session token manager.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Delete every token of `token.principal_id` and insert `token`, atomically
    /// with respect to other calls for the same principal.
    async fn replace_for_principal(&self, token: &SessionToken) -> Result<(), StoreError>;

    /// Look up a token by value. Expired tokens are returned as-is.
    async fn find(&self, value: &str) -> Result<Option<SessionToken>, StoreError>;

    /// Delete a token. Returns `false` if it did not exist.
    async fn delete(&self, value: &str) -> Result<bool, StoreError>;

    /// Move a token's expiry. Returns `false` if it did not exist.
    async fn extend(&self, value: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Delete every token with `expires_at < now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Read-only product and category lookups.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Get a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Get a category by id.
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    /// Products with `stock < threshold`, lowest stock first.
    async fn list_low_stock(&self, threshold: u32) -> Result<Vec<Product>, StoreError>;
}

/// Autocommit stock mutations on a single product.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Atomically check `stock >= quantity` and decrement.
    async fn reserve(&self, product: ProductId, quantity: u32)
    -> Result<Reservation, StoreError>;

    /// Add `quantity` units. Returns the new stock, or `None` for an unknown product.
    async fn restock(&self, product: ProductId, quantity: u32) -> Result<Option<u32>, StoreError>;
}

/// A unit of work covering the reservations and inserts of one order submission.
///
/// Nothing done through a `FulfillmentTx` is visible to other readers as an
/// order until [`FulfillmentTx::commit`] succeeds. Dropping the unit without
/// committing releases every reservation it made.
#[async_trait]
pub trait FulfillmentTx: Send {
    /// Reserve stock for one cart line inside this unit.
    async fn reserve(
        &mut self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Reservation, StoreError>;

    /// Insert the order header and its items.
    ///
    /// Returns `StoreError::Conflict` if the tracking id is already taken.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError>;

    /// Make the order and the stock changes visible.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard the order and release every reservation.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Start a fulfillment unit of work.
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx>, StoreError>;

    /// Get an order with its items.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Get an order by tracking id.
    async fn find_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<Order>, StoreError>;

    /// Whether a tracking id is already used by a committed order.
    async fn tracking_id_exists(&self, tracking_id: &TrackingId) -> Result<bool, StoreError>;

    /// Orders placed with the given contact email, newest first.
    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, StoreError>;

    /// One page of orders, newest first, optionally filtered by status.
    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError>;

    /// Set `status = to` only if the order is currently `from`.
    ///
    /// When `release_stock` is set, every item's quantity is returned to its
    /// product in the same unit as the status change.
    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        release_stock: bool,
    ) -> Result<StatusUpdate, StoreError>;
}

/// Append-only activity log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: NewActivity) -> Result<ActivityLog, StoreError>;

    /// Every entry, newest first.
    async fn list_all(&self) -> Result<Vec<ActivityLog>, StoreError>;

    /// Entries recorded by one actor, newest first.
    async fn list_by_actor(&self, actor: PrincipalId) -> Result<Vec<ActivityLog>, StoreError>;
}

/// Connectivity probe for readiness checks.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Succeeds if the backend can serve requests.
    async fn ping(&self) -> Result<(), StoreError>;
}

// =============================================================================
// Backend bundle
// =============================================================================

/// A complete set of storage handles.
#[derive(Clone)]
pub struct Backend {
    pub principals: Arc<dyn PrincipalStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub catalog: Arc<dyn Catalog>,
    pub stock: Arc<dyn StockLedger>,
    pub orders: Arc<dyn OrderStore>,
    pub audit: Arc<dyn AuditStore>,
    pub health: Arc<dyn HealthCheck>,
}

impl Backend {
    /// Backend over a `PostgreSQL` pool.
    #[must_use]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use crate::db::{
            PgActivityLog, PgCatalog, PgHealth, PgOrders, PgPrincipals, PgStock, PgTokens,
        };

        Self {
            principals: Arc::new(PgPrincipals::new(pool.clone())),
            tokens: Arc::new(PgTokens::new(pool.clone())),
            catalog: Arc::new(PgCatalog::new(pool.clone())),
            stock: Arc::new(PgStock::new(pool.clone())),
            orders: Arc::new(PgOrders::new(pool.clone())),
            audit: Arc::new(PgActivityLog::new(pool.clone())),
            health: Arc::new(PgHealth::new(pool)),
        }
    }

    /// Backend over an in-memory store.
    #[must_use]
    pub fn in_memory(store: &memory::MemoryStore) -> Self {
        Self {
            principals: Arc::new(store.clone()),
            tokens: Arc::new(store.clone()),
            catalog: Arc::new(store.clone()),
            stock: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            audit: Arc::new(store.clone()),
            health: Arc::new(store.clone()),
        }
    }
}
