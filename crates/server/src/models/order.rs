//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{
    Email, Money, MoneyError, OrderId, OrderItemId, OrderStatus, ProductId, TrackingId,
};

/// Default page size for order listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Customer contact details captured with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub email: Option<Email>,
    pub address: String,
}

/// One line of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Product price when the order was placed. Does not follow later price changes.
    pub unit_price: Money,
}

impl OrderItem {
    /// `unit_price × quantity`.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the product is not representable.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price.times(self.quantity)
    }
}

/// A persisted order with its items in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub tracking_id: TrackingId,
    pub customer: CustomerInfo,
    /// Sum of `unit_price × quantity` over the items, fixed at creation.
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// A priced cart line, ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order assembled by the fulfillment engine, not yet persisted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tracking_id: TrackingId,
    pub customer: CustomerInfo,
    pub lines: Vec<NewOrderLine>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// Zero-based page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Build a page request, clamping `size` to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn size(self) -> u32 {
        self.size
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` rows.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.size.max(1)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps_size() {
        assert_eq!(PageRequest::new(0, 0).size(), 1);
        assert_eq!(PageRequest::new(0, 500).size(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::default().size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_offset_and_count() {
        assert_eq!(PageRequest::new(3, 10).offset(), 30);

        let page: Page<u8> = Page {
            items: vec![],
            page: 0,
            size: 10,
            total: 21,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_line_total() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            product_id: ProductId::new(1),
            quantity: 3,
            unit_price: Money::from_cents(1999),
        };
        assert_eq!(item.line_total().unwrap(), Money::from_cents(5997));
    }
}
