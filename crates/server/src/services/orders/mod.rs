//! Order fulfillment engine.
//!
//! # Submission
//!
//! ```text
//! validate ─► products exist? ─► pick tracking id ─► begin unit
//!                                                        │
//!        ┌───────────────────────────────────────────────┘
//!        ▼
//!   reserve line 1 … reserve line N ─► price snapshot + total ─► insert ─► commit
//!        │ any failure
//!        └──► rollback (every reservation of this unit is released)
//! ```
//!
//! A tracking id taken by a concurrent writer between the pre-check and
//! commit rolls the unit back and reruns it under a fresh id. Pre-check
//! collisions and commit conflicts share one bound on attempts.
//!
//! Nothing of a submission is visible to other readers until commit: no
//! order, no items, and no stock change.
//!
//! # Status changes
//!
//! Only `Pending → Shipped`, `Pending → Cancelled` and `Shipped → Delivered`
//! are accepted. The store applies the change conditionally on the status
//! read here, and cancelling returns the order's units to stock in the same
//! unit as the status update.

mod error;

pub use error::OrderError;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use shopfront_core::{Email, Money, OrderId, OrderStatus, ProductId, TrackingId};

use crate::clock::Clock;
use crate::models::{
    AuditAction, CustomerInfo, NewOrder, NewOrderLine, Order, Page, PageRequest, Principal,
};
use crate::services::audit::AuditSink;
use crate::store::{
    Catalog, FulfillmentTx, OrderStore, Reservation, StatusUpdate, StoreError, bounded,
};

/// Most lines a single order may have.
pub const MAX_LINES: usize = 100;

/// Most units a single line may ask for.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Tracking ids drawn per submission before giving up.
const TRACKING_ID_ATTEMPTS: usize = 5;

const NAME_LENGTH: (usize, usize) = (3, 100);
const PHONE_LENGTH: (usize, usize) = (5, 15);

/// One requested cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Draw a random tracking id.
fn generate_tracking_id() -> TrackingId {
    let mut entropy = [0u8; 10];
    rand::rng().fill_bytes(&mut entropy);
    TrackingId::from_entropy(entropy)
}

/// Converts carts into orders and moves orders through their statuses.
pub struct FulfillmentEngine {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    audit: Arc<AuditSink>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl FulfillmentEngine {
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn Catalog>,
        audit: Arc<AuditSink>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            orders,
            catalog,
            audit,
            clock,
            timeout,
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Place an order for `lines`, reserving stock for every line or none.
    ///
    /// # Errors
    ///
    /// - `OrderError::Invalid` for bad contact details or an empty/oversized cart
    /// - `OrderError::UnknownProduct` if a line names a missing product
    /// - `OrderError::InsufficientStock` if a line cannot be covered
    /// - `OrderError::DuplicateTrackingId` if no free tracking id was found
    /// - `OrderError::Store` on storage failure or timeout
    ///
    /// On every error nothing is persisted and stock is unchanged.
    #[instrument(skip(self, customer, lines), fields(lines = lines.len()))]
    pub async fn submit(
        &self,
        customer: CustomerInfo,
        lines: &[CartLine],
    ) -> Result<Order, OrderError> {
        let customer = validate_customer(customer)?;
        validate_lines(lines)?;
        self.ensure_products_exist(lines).await?;

        for attempt in 1..=TRACKING_ID_ATTEMPTS {
            let tracking_id = generate_tracking_id();
            if bounded(self.timeout, self.orders.tracking_id_exists(&tracking_id)).await? {
                warn!(attempt, %tracking_id, "Tracking id collision, drawing again");
                continue;
            }

            match self.place(customer.clone(), lines, tracking_id).await {
                Err(OrderError::DuplicateTrackingId) => {
                    warn!(attempt, "Tracking id taken before commit, drawing again");
                }
                outcome => return outcome,
            }
        }
        Err(OrderError::DuplicateTrackingId)
    }

    /// Run one unit of work: commit on success, roll back on any failure.
    async fn place(
        &self,
        customer: CustomerInfo,
        lines: &[CartLine],
        tracking_id: TrackingId,
    ) -> Result<Order, OrderError> {
        let mut tx = bounded(self.timeout, self.orders.begin()).await?;
        match self.fill(tx.as_mut(), customer, lines, tracking_id).await {
            Ok(order) => {
                bounded(self.timeout, tx.commit())
                    .await
                    .map_err(duplicate_on_conflict)?;
                info!(
                    order_id = %order.id,
                    tracking_id = %order.tracking_id,
                    total = %order.total_amount,
                    "Order placed"
                );
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback) = bounded(self.timeout, tx.rollback()).await {
                    warn!(error = %rollback, "Rollback of failed order submission failed");
                }
                Err(e)
            }
        }
    }

    /// Reserve, price and insert inside an open unit.
    async fn fill(
        &self,
        tx: &mut dyn FulfillmentTx,
        customer: CustomerInfo,
        lines: &[CartLine],
        tracking_id: TrackingId,
    ) -> Result<Order, OrderError> {
        let mut priced = Vec::with_capacity(lines.len());

        for line in lines {
            let reservation =
                bounded(self.timeout, tx.reserve(line.product_id, line.quantity)).await?;

            match reservation {
                Reservation::Reserved { unit_price, .. } => priced.push(NewOrderLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price,
                }),
                Reservation::Insufficient { shortfall } => {
                    return Err(OrderError::InsufficientStock {
                        product: line.product_id,
                        shortfall,
                    });
                }
                Reservation::UnknownProduct => {
                    return Err(OrderError::UnknownProduct(line.product_id));
                }
            }
        }

        let draft = NewOrder {
            tracking_id,
            customer,
            total_amount: total_of(&priced)?,
            lines: priced,
            created_at: self.clock.now(),
        };

        bounded(self.timeout, tx.insert_order(&draft))
            .await
            .map_err(duplicate_on_conflict)
    }

    async fn ensure_products_exist(&self, lines: &[CartLine]) -> Result<(), OrderError> {
        let mut seen = HashSet::with_capacity(lines.len());
        for line in lines {
            if !seen.insert(line.product_id) {
                continue;
            }
            if bounded(self.timeout, self.catalog.get_product(line.product_id))
                .await?
                .is_none()
            {
                return Err(OrderError::UnknownProduct(line.product_id));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Move an order to `to` on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` for changes outside the
    /// transition matrix, leaving the order untouched, and
    /// `OrderError::NotFound` for a missing order.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn set_status(
        &self,
        actor: &Principal,
        id: OrderId,
        to: OrderStatus,
    ) -> Result<Order, OrderError> {
        let current = self.get(id).await?;
        let from = current.status;

        if !from.can_transition_to(to) {
            return Err(OrderError::InvalidTransition { from, to });
        }

        let release_stock = to == OrderStatus::Cancelled;
        let order = match bounded(
            self.timeout,
            self.orders.transition(id, from, to, release_stock),
        )
        .await?
        {
            StatusUpdate::Applied(order) => order,
            StatusUpdate::NotFound => return Err(OrderError::NotFound),
            StatusUpdate::Stale { current } => {
                return Err(OrderError::InvalidTransition { from: current, to });
            }
        };

        info!(%from, %to, tracking_id = %order.tracking_id, "Order status changed");
        self.audit
            .record(
                Some(actor.id),
                AuditAction::OrderStatusUpdated,
                format!(
                    "Updated order status from {from} to {to} for order #{}",
                    order.tracking_id
                ),
            )
            .await;
        Ok(order)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if it does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        bounded(self.timeout, self.orders.get(id))
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Get an order by its public tracking id.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if it does not exist.
    pub async fn track(&self, tracking_id: &TrackingId) -> Result<Order, OrderError> {
        bounded(self.timeout, self.orders.find_by_tracking_id(tracking_id))
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Orders placed with `email` as contact address, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Store` if storage fails.
    pub async fn list_for_email(&self, email: &Email) -> Result<Vec<Order>, OrderError> {
        Ok(bounded(self.timeout, self.orders.list_by_email(email)).await?)
    }

    /// One page of orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Store` if storage fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, OrderError> {
        Ok(bounded(self.timeout, self.orders.list(status, page)).await?)
    }
}

fn duplicate_on_conflict(err: StoreError) -> OrderError {
    match err {
        StoreError::Conflict(_) => OrderError::DuplicateTrackingId,
        other => OrderError::Store(other),
    }
}

/// Exact `Σ unit_price × quantity`.
fn total_of(lines: &[NewOrderLine]) -> Result<Money, OrderError> {
    lines
        .iter()
        .try_fold(Money::ZERO, |total, line| {
            line.unit_price
                .times(line.quantity)
                .and_then(|amount| total.checked_add(amount))
        })
        .map_err(|_| OrderError::Invalid("order total is out of range".to_owned()))
}

fn check_length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), OrderError> {
    let length = value.chars().count();
    if (min..=max).contains(&length) {
        Ok(())
    } else {
        Err(OrderError::Invalid(format!(
            "{field} must be between {min} and {max} characters"
        )))
    }
}

/// Trim and check contact details.
fn validate_customer(customer: CustomerInfo) -> Result<CustomerInfo, OrderError> {
    let name = customer.name.trim().to_owned();
    let phone = customer.phone.trim().to_owned();
    let address = customer.address.trim().to_owned();

    check_length("customer name", &name, NAME_LENGTH)?;
    check_length("customer phone", &phone, PHONE_LENGTH)?;
    if address.is_empty() {
        return Err(OrderError::Invalid(
            "customer address is required".to_owned(),
        ));
    }

    Ok(CustomerInfo {
        name,
        phone,
        email: customer.email,
        address,
    })
}

fn validate_lines(lines: &[CartLine]) -> Result<(), OrderError> {
    if lines.is_empty() {
        return Err(OrderError::Invalid(
            "order must have at least one item".to_owned(),
        ));
    }
    if lines.len() > MAX_LINES {
        return Err(OrderError::Invalid(format!(
            "order cannot have more than {MAX_LINES} items"
        )));
    }
    if lines
        .iter()
        .any(|line| line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY)
    {
        return Err(OrderError::Invalid(format!(
            "quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}
