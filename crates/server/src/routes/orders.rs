//! Public and customer order routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopfront_core::{Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, TrackingId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{CustomerInfo, Order, OrderItem};
use crate::services::CartLine;
use crate::state::AppState;

/// Order submission body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub customer_address: String,
    pub items: Vec<CartLine>,
}

impl OrderRequest {
    fn customer(&self) -> Result<CustomerInfo> {
        let email = self
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(Email::parse)
            .transpose()
            .map_err(|_| AppError::BadRequest("Invalid customer email".to_string()))?;

        Ok(CustomerInfo {
            name: self.customer_name.clone(),
            phone: self.customer_phone.clone(),
            email,
            address: self.customer_address.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

/// Order as returned to clients, with flattened customer fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub tracking_id: TrackingId,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<Email>,
    pub customer_address: String,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.unit_price,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            tracking_id: order.tracking_id,
            customer_name: order.customer.name,
            customer_phone: order.customer.phone,
            customer_email: order.customer.email,
            customer_address: order.customer.address,
            total_amount: order.total_amount,
            status: order.status,
            order_date: order.created_at,
        }
    }
}

/// Place an order. Any signed-in principal may order.
///
/// POST /api/orders
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Json(body): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let customer = body.customer()?;
    let order = state.orders().submit(customer, &body.items).await?;

    tracing::info!(
        principal_id = %principal.id,
        tracking_id = %order.tracking_id,
        "Order placed"
    );
    add_breadcrumb(
        "orders",
        "Order submitted",
        Some(&[("tracking_id", order.tracking_id.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// Public lookup by tracking id.
///
/// GET /api/orders/track/{trackingId}
pub async fn track(
    State(state): State<AppState>,
    Path(tracking_id): Path<String>,
) -> Result<Json<OrderResponse>> {
    // A malformed id cannot name an order.
    let tracking_id = TrackingId::parse(&tracking_id)
        .map_err(|_| AppError::NotFound("Order not found".to_string()))?;

    let order = state.orders().track(&tracking_id).await?;
    Ok(Json(order.into()))
}

/// Orders whose contact email is the caller's.
///
/// GET /api/orders/my
pub async fn my_orders(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Vec<OrderResponse>>> {
    let orders = state.orders().list_for_email(&principal.email).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}
