//! Admin order management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shopfront_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::order::DEFAULT_PAGE_SIZE;
use crate::models::{Page, PageRequest};
use crate::routes::orders::OrderResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse::<OrderStatus>().map_err(AppError::BadRequest)
}

/// Paged order listing, newest first.
///
/// GET /api/admin/orders?status=&page=&size=
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Page<OrderResponse>>> {
    let status = query
        .status
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(parse_status)
        .transpose()?;
    let request = PageRequest::new(
        query.page.unwrap_or(0),
        query.size.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let page = state.orders().list(status, request).await?;
    Ok(Json(Page {
        items: page.items.into_iter().map(OrderResponse::from).collect(),
        page: page.page,
        size: page.size,
        total: page.total,
    }))
}

/// GET /api/admin/orders/{id}
pub async fn get(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<OrderResponse>> {
    let order = state.orders().get(OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// Move an order along the status matrix.
///
/// PUT /api/admin/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<OrderResponse>> {
    let to = parse_status(&body.status)?;
    let order = state
        .orders()
        .set_status(&actor, OrderId::new(id), to)
        .await?;
    Ok(Json(order.into()))
}
