//! End-to-end checks through the router: authentication, order placement
//! and tracking, and the admin surface.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use shopfront_core::Money;
use shopfront_integration_tests::TestApp;

fn order_body(product_id: i32, quantity: u32, email: Option<&str>) -> Value {
    json!({
        "customerName": "Ada Lovelace",
        "customerPhone": "5550199",
        "customerEmail": email,
        "customerAddress": "12 Analytical Row",
        "items": [{ "productId": product_id, "quantity": quantity }],
    })
}

fn money(value: &Value) -> Money {
    serde_json::from_value(value.clone()).unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));

    let (status, _) = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new();
    let token = app.register_customer("Ada Lovelace", "ada@example.com").await;

    let (status, me) = app
        .request(Method::GET, "/api/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["role"], "customer");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "ADA@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], false);

    // Logging in again replaced the registration token.
    let (status, _) = app
        .request(Method::GET, "/api/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_credentials_and_duplicates() {
    let app = TestApp::new();
    app.register_customer("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({ "name": "Ada Again", "email": "ada@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_missing_and_expired_tokens_are_rejected() {
    let app = TestApp::new();

    let (status, _) = app.request(Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/api/users/me", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.register_customer("Ada Lovelace", "ada@example.com").await;
    app.clock.advance(chrono::Duration::days(7));
    let (status, _) = app
        .request(Method::GET, "/api/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_and_logout() {
    let app = TestApp::new();
    let token = app.register_customer("Ada Lovelace", "ada@example.com").await;

    app.clock.advance(chrono::Duration::days(5));
    let (status, body) = app
        .request(Method::POST, "/api/auth-tokens/refresh", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["expiresAt"].is_string());

    app.clock.advance(chrono::Duration::days(5));
    let (status, _) = app
        .request(Method::GET, "/api/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..2 {
        let (status, _) = app
            .request(Method::POST, "/api/auth-tokens/logout", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (status, _) = app
        .request(Method::GET, "/api/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request(Method::POST, "/api/auth-tokens/refresh", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["expiresAt"].is_null());
}

#[tokio::test]
async fn test_place_track_and_list_orders() {
    let app = TestApp::new();
    let product = app
        .store
        .add_product("Brass Gear", Money::from_cents(1_250), 8, None);
    let token = app.register_customer("Ada Lovelace", "ada@example.com").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/orders",
            None,
            Some(order_body(product.id.as_i32(), 2, Some("ada@example.com"))),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, order) = app
        .request(
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(order_body(product.id.as_i32(), 2, Some("ada@example.com"))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "Pending");
    assert_eq!(money(&order["totalAmount"]), Money::from_cents(2_500));
    assert_eq!(money(&order["items"][0]["price"]), Money::from_cents(1_250));
    assert_eq!(app.store.stock_of(product.id), Some(6));

    let tracking_id = order["trackingId"].as_str().unwrap();
    let (status, tracked) = app
        .request(
            Method::GET,
            &format!("/api/orders/track/{tracking_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracked["id"], order["id"]);

    let (status, _) = app
        .request(Method::GET, "/api/orders/track/TRK-nope", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, mine) = app
        .request(Method::GET, "/api/orders/my", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_order_rejections() {
    let app = TestApp::new();
    let product = app
        .store
        .add_product("Brass Gear", Money::from_cents(1_250), 1, None);
    let token = app.register_customer("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(order_body(product.id.as_i32(), 2, None)),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("insufficient stock"));

    let (status, _) = app
        .request(
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(order_body(9_999, 1, None)),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/orders",
            Some(&token),
            Some(order_body(product.id.as_i32(), 1, Some("not-an-email"))),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.stock_of(product.id), Some(1));
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_admin_bootstrap_is_one_shot() {
    let app = TestApp::new();

    let (_, exists) = app.request(Method::GET, "/api/admin/exists", None, None).await;
    assert_eq!(exists, json!(false));

    let admin = app.bootstrap_admin().await;
    let (_, exists) = app.request(Method::GET, "/api/admin/exists", None, None).await;
    assert_eq!(exists, json!(true));

    let (status, _) = app
        .request(
            Method::POST,
            "/api/admin/register-first",
            None,
            Some(json!({ "name": "Second Admin", "email": "two@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .request(
            Method::POST,
            "/api/admin/register",
            Some(&admin),
            Some(json!({ "name": "Second Admin", "email": "two@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "admin");

    let (status, admins) = app
        .request(Method::GET, "/api/admin/list", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admins.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_customers_cannot_use_admin_routes() {
    let app = TestApp::new();
    app.bootstrap_admin().await;
    let customer = app.register_customer("Ada Lovelace", "ada@example.com").await;

    for uri in ["/api/admin/orders", "/api/admin/users", "/api/admin/activity-logs"] {
        let (status, _) = app.request(Method::GET, uri, Some(&customer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");

        let (status, _) = app.request(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let (status, _) = app
        .request(
            Method::POST,
            "/api/admin/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_order_workflow() {
    let app = TestApp::new();
    let admin = app.bootstrap_admin().await;
    let customer = app.register_customer("Ada Lovelace", "ada@example.com").await;
    let product = app
        .store
        .add_product("Brass Gear", Money::from_cents(1_250), 4, None);

    let (_, order) = app
        .request(
            Method::POST,
            "/api/orders",
            Some(&customer),
            Some(order_body(product.id.as_i32(), 3, None)),
        )
        .await;
    let status_uri = format!("/api/admin/orders/{}/status", order["id"]);

    let (status, page) = app
        .request(Method::GET, "/api/admin/orders?status=pending", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], order["id"]);

    let (status, _) = app
        .request(
            Method::PUT,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "DELIVERED" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(
            Method::PUT,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .request(
            Method::PUT,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "Cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "Cancelled");
    assert_eq!(app.store.stock_of(product.id), Some(4));

    let (status, _) = app
        .request(Method::GET, "/api/admin/orders/424242", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restock_low_stock_and_activity_log() {
    let app = TestApp::new();
    let admin = app.bootstrap_admin().await;
    let gear = app
        .store
        .add_product("Brass Gear", Money::from_cents(1_250), 2, None);
    app.store
        .add_product("Copper Wire", Money::from_cents(300), 40, None);

    let (status, low) = app
        .request(Method::GET, "/api/admin/products/low-stock", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let low = low.as_array().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["name"], "Brass Gear");

    let (status, restocked) = app
        .request(
            Method::POST,
            &format!("/api/admin/products/{}/restock", gear.id.as_i32()),
            Some(&admin),
            Some(json!({ "quantity": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restocked["stock"], 12);
    assert_eq!(app.store.stock_of(gear.id), Some(12));

    let (status, _) = app
        .request(
            Method::POST,
            "/api/admin/products/9999/restock",
            Some(&admin),
            Some(json!({ "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, mine) = app
        .request(Method::GET, "/api/admin/activity-logs/my", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        mine.as_array()
            .unwrap()
            .iter()
            .any(|entry| entry["action"] == "STOCK_RESTOCKED")
    );
}

#[tokio::test]
async fn test_deleting_a_user_ends_their_session() {
    let app = TestApp::new();
    let admin = app.bootstrap_admin().await;
    let customer = app.register_customer("Ada Lovelace", "ada@example.com").await;

    let (_, me) = app
        .request(Method::GET, "/api/users/me", Some(&customer), None)
        .await;
    let user_uri = format!("/api/admin/users/{}", me["id"]);

    let (status, _) = app
        .request(Method::DELETE, &user_uri, Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(Method::GET, "/api/users/me", Some(&customer), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::DELETE, &user_uri, Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
