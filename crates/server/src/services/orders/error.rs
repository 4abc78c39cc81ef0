//! Fulfillment error types.

use thiserror::Error;

use shopfront_core::{OrderStatus, ProductId};

use crate::error::ErrorKind;
use crate::store::StoreError;

/// Errors from order submission, status changes and order lookups.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart or contact details failed validation.
    #[error("invalid order: {0}")]
    Invalid(String),

    /// A cart line names a product that does not exist.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// A cart line asks for more units than are in stock.
    #[error("insufficient stock for product {product}: {shortfall} more needed")]
    InsufficientStock { product: ProductId, shortfall: u32 },

    /// The status change is not in the transition matrix.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// No such order.
    #[error("order not found")]
    NotFound,

    /// No unused tracking id could be assigned.
    #[error("tracking id already in use")]
    DuplicateTrackingId,

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Classification used for the HTTP status.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::UnknownProduct(_) | Self::NotFound => ErrorKind::NotFound,
            Self::InsufficientStock { .. }
            | Self::InvalidTransition { .. }
            | Self::DuplicateTrackingId => ErrorKind::Conflict,
            Self::Store(err) => ErrorKind::from_store(err),
        }
    }
}
