//! `/api/admin` routes. Everything except `exists`, `register-first` and
//! `login` requires an admin bearer token; the latter two are mounted with
//! the rate-limited credential routes.

pub mod accounts;
pub mod activity;
pub mod inventory;
pub mod orders;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Admin endpoints behind `RequireAdmin`, plus the public `exists` probe.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exists", get(accounts::exists))
        .route("/register", post(accounts::register))
        .route("/profile", get(accounts::profile))
        .route("/list", get(accounts::list_admins))
        .route("/users", get(accounts::list_users))
        .route(
            "/users/{id}",
            get(accounts::get_user).delete(accounts::delete_user),
        )
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::get))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/products/low-stock", get(inventory::low_stock))
        .route("/products/{id}/restock", post(inventory::restock))
        .route("/activity-logs", get(activity::list_all))
        .route("/activity-logs/my", get(activity::list_mine))
}
