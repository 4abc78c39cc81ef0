//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Storage ping
//!
//! # Sessions
//! POST   /api/users/register              - Customer sign-up (rate limited)
//! POST   /api/users/login                 - Customer login (rate limited)
//! GET    /api/users/me                    - Current principal
//! GET    /api/users/profile               - Current principal
//! POST   /api/auth-tokens/refresh         - Extend the bearer token
//! POST   /api/auth-tokens/logout          - Invalidate the bearer token
//!
//! # Orders
//! POST   /api/orders                      - Place an order (bearer token)
//! GET    /api/orders/track/{trackingId}   - Public tracking lookup
//! GET    /api/orders/my                   - Caller's orders
//!
//! # Admin
//! POST   /api/admin/login                 - Admin login (rate limited)
//! GET    /api/admin/exists                - Any admin yet?
//! POST   /api/admin/register-first        - Bootstrap the first admin (rate limited)
//! POST   /api/admin/register              - Create an admin
//! GET    /api/admin/profile | /list
//! GET    /api/admin/users[/{id}], DELETE /api/admin/users/{id}
//! GET    /api/admin/orders[/{id}], PUT /api/admin/orders/{id}/status
//! POST   /api/admin/products/{id}/restock
//! GET    /api/admin/products/low-stock
//! GET    /api/admin/activity-logs[/my]
//! ```

pub mod admin;
pub mod health;
pub mod orders;
pub mod users;

use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, make_request_span, request_id_middleware,
};
use crate::state::AppState;

/// Router-level switches.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Apply per-IP rate limits. Needs a client address, so the server must
    /// be started with connect info.
    pub rate_limited: bool,
    /// Allowed CORS origin; any origin when `None`.
    pub cors_origin: Option<String>,
}

/// Endpoints that hand out credentials.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route("/api/admin/login", post(admin::accounts::login))
        .route("/api/admin/register-first", post(admin::accounts::register_first))
}

fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(users::me))
        .route("/api/users/profile", get(users::me))
        .route("/api/auth-tokens/refresh", post(users::refresh))
        .route("/api/auth-tokens/logout", post(users::logout))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders/track/{tracking_id}", get(orders::track))
        .route("/api/orders/my", get(orders::my_orders))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

/// Build the full application router.
pub fn router(state: AppState, options: &RouterOptions) -> Router {
    let mut auth = auth_routes();
    let mut submit = Router::new().route("/api/orders", post(orders::submit));
    if options.rate_limited {
        auth = auth.layer(auth_rate_limiter());
        submit = submit.layer(api_rate_limiter());
    }

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(auth)
        .merge(submit)
        .merge(session_routes())
        .merge(order_routes())
        .nest("/api/admin", admin::routes())
        .layer(cors_layer(options.cors_origin.as_deref()))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .with_state(state)
}
