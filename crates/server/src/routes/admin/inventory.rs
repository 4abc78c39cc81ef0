//! Admin stock routes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shopfront_core::ProductId;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::services::inventory::DEFAULT_LOW_STOCK_THRESHOLD;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub product_id: ProductId,
    pub stock: u32,
}

/// POST /api/admin/products/{id}/restock
pub async fn restock(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<RestockRequest>,
) -> Result<Json<StockResponse>> {
    let product_id = ProductId::new(id);
    let stock = state
        .inventory()
        .restock(&actor, product_id, body.quantity)
        .await?;
    Ok(Json(StockResponse { product_id, stock }))
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u32>,
}

/// Products with fewer than `threshold` units, lowest first.
///
/// GET /api/admin/products/low-stock?threshold=
pub async fn low_stock(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<Product>>> {
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    Ok(Json(state.inventory().low_stock(threshold).await?))
}
