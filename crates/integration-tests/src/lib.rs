//! Integration tests for shopfront.
//!
//! Everything runs against the in-memory backend with a manually advanced
//! clock, so no database or running server is needed:
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `sessions` - single-session and expiry properties
//! - `fulfillment` - stock atomicity, concurrency, tracking ids, status matrix
//! - `http_api` - the axum router end to end via `tower::ServiceExt::oneshot`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use shopfront_server::clock::{Clock, ManualClock};
use shopfront_server::models::{CustomerInfo, Principal};
use shopfront_server::routes::{RouterOptions, router};
use shopfront_server::services::ServiceSettings;
use shopfront_server::state::AppState;
use shopfront_server::store::Backend;
use shopfront_server::store::memory::MemoryStore;

/// Fixed starting instant for every test clock.
#[must_use]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap()
}

/// Valid contact details for an order.
#[must_use]
pub fn customer(name: &str) -> CustomerInfo {
    CustomerInfo {
        name: name.to_owned(),
        phone: "5550100".to_owned(),
        email: None,
        address: "1 Market Street".to_owned(),
    }
}

/// An in-memory application: services, router and the handles tests poke at.
pub struct TestApp {
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub state: AppState,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start_time());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let state = AppState::new(
            Backend::in_memory(&store),
            shared,
            ServiceSettings::default(),
        );
        let router = router(state.clone(), &RouterOptions::default());

        Self {
            store,
            clock,
            state,
            router,
        }
    }

    /// Send one request through the router. Non-JSON bodies come back as a
    /// JSON string; empty bodies as `null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Register a customer over HTTP and return its bearer token.
    pub async fn register_customer(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/users/register",
                None,
                Some(serde_json::json!({ "name": name, "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["token"].as_str().unwrap().to_owned()
    }

    /// Create the first admin and log it in over HTTP. Returns the token.
    pub async fn bootstrap_admin(&self) -> String {
        let (status, _) = self
            .request(
                Method::POST,
                "/api/admin/register-first",
                None,
                Some(serde_json::json!({
                    "name": "Root Admin",
                    "email": "root@example.com",
                    "password": "secret1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .request(
                Method::POST,
                "/api/admin/login",
                None,
                Some(serde_json::json!({ "email": "root@example.com", "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_owned()
    }

    /// Create the first admin directly through the services.
    pub async fn admin_principal(&self) -> Principal {
        self.state
            .credentials()
            .register_first_admin("Root Admin", "root@example.com", "secret1")
            .await
            .unwrap()
    }
}
