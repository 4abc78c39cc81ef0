//! Inventory ledger.
//!
//! Every stock decrement is one atomic check-and-decrement on a single
//! product (see [`StockLedger::reserve`]). Concurrent reservations of the
//! same product serialize on that product alone; different products never
//! contend.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument};

use shopfront_core::ProductId;

use crate::models::{AuditAction, Principal, Product};
use crate::services::audit::AuditSink;
use crate::store::{Catalog, Reservation, StockLedger, StoreError, bounded};

/// Threshold used by the low-stock report when none is given.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Errors from stock operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Not enough units; nothing was changed.
    #[error("insufficient stock for product {product}: {shortfall} more needed")]
    InsufficientStock { product: ProductId, shortfall: u32 },

    /// No product with that id.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// Quantities must be at least one.
    #[error("quantity must be positive")]
    InvalidQuantity,

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Owner of the per-product stock counters.
pub struct InventoryLedger {
    stock: Arc<dyn StockLedger>,
    catalog: Arc<dyn Catalog>,
    audit: Arc<AuditSink>,
    timeout: Duration,
}

impl InventoryLedger {
    #[must_use]
    pub fn new(
        stock: Arc<dyn StockLedger>,
        catalog: Arc<dyn Catalog>,
        audit: Arc<AuditSink>,
        timeout: Duration,
    ) -> Self {
        Self {
            stock,
            catalog,
            audit,
            timeout,
        }
    }

    /// Take `quantity` units of `product`. Returns the stock left.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientStock` (with the shortfall) when the
    /// product has fewer than `quantity` units, leaving stock untouched.
    #[instrument(skip(self))]
    pub async fn reserve(&self, product: ProductId, quantity: u32) -> Result<u32, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity);
        }

        match bounded(self.timeout, self.stock.reserve(product, quantity)).await? {
            Reservation::Reserved { remaining, .. } => Ok(remaining),
            Reservation::Insufficient { shortfall } => {
                Err(LedgerError::InsufficientStock { product, shortfall })
            }
            Reservation::UnknownProduct => Err(LedgerError::UnknownProduct(product)),
        }
    }

    /// Add `quantity` units to `product` on behalf of `actor`. Returns the new stock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownProduct` or `InvalidQuantity`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn restock(
        &self,
        actor: &Principal,
        product: ProductId,
        quantity: u32,
    ) -> Result<u32, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity);
        }

        let stock = bounded(self.timeout, self.stock.restock(product, quantity))
            .await?
            .ok_or(LedgerError::UnknownProduct(product))?;

        info!(stock, "Restocked product");
        self.audit
            .record(
                Some(actor.id),
                AuditAction::StockRestocked,
                format!("Restocked {quantity} units of product #{product} (stock now {stock})"),
            )
            .await;
        Ok(stock)
    }

    /// Products with fewer than `threshold` units, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if storage fails.
    pub async fn low_stock(&self, threshold: u32) -> Result<Vec<Product>, LedgerError> {
        Ok(bounded(self.timeout, self.catalog.list_low_stock(threshold)).await?)
    }
}
