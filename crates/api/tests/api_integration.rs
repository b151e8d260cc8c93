//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

const ADMIN_SECRET: &str = "test-admin-secret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let state = api::create_default_state(InMemoryStore::new(), Some(ADMIN_SECRET.to_string()));
    api::create_app(state, get_metrics_handle())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    caller: Option<(&str, &str)>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = caller {
        builder = builder.header("x-user-id", user_id).header("x-user-role", role);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register_user(app: &Router, email: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/users",
        Some(json!({ "name": "Kim", "email": email, "password": "pass1234" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["user_id"].as_str().unwrap().to_string()
}

async fn register_admin(app: &Router) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/users/admin",
        Some(json!({
            "name": "Admin",
            "email": "admin@example.com",
            "password": "admin1234",
            "admin_secret_key": ADMIN_SECRET,
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["user_id"].as_str().unwrap().to_string()
}

async fn add_product(app: &Router, name: &str, stock: u32) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/products",
        Some(json!({ "name": name, "price": 1500, "stock": stock })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["product_id"].as_str().unwrap().to_string()
}

async fn place_order(app: &Router, user_id: &str, product_id: &str, quantity: u32) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/orders",
        Some(json!({
            "user_id": user_id,
            "product_id": product_id,
            "quantity": quantity,
            "shipping_address": "1 Main St",
        })),
        None,
    )
    .await
}

async fn stock_of(app: &Router, product_id: &str) -> u64 {
    let (status, json) = send(app, "GET", &format!("/api/products/{product_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    json["stock"].as_u64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_place_order() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 10).await;

    let (status, json) = place_order(&app, &user_id, &product_id, 3).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user_id"], user_id.as_str());
    assert_eq!(json["product_name"], "Widget");
    assert_eq!(json["quantity"], 3);
    assert_eq!(json["delivery_status"], "ORDERED");
    assert!(json["ordered_at"].as_str().is_some());
    assert_eq!(stock_of(&app, &product_id).await, 7);
}

#[tokio::test]
async fn test_place_order_insufficient_stock() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 2).await;

    let (status, json) = place_order(&app, &user_id, &product_id, 3).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Widget"));
    assert_eq!(stock_of(&app, &product_id).await, 2);
}

#[tokio::test]
async fn test_place_order_unknown_user_and_product() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 5).await;
    let missing = uuid::Uuid::new_v4().to_string();

    let (status, _) = place_order(&app, &missing, &product_id, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = place_order(&app, &user_id, &missing, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(stock_of(&app, &product_id).await, 5);
}

#[tokio::test]
async fn test_place_order_zero_quantity() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 5).await;

    let (status, _) = place_order(&app, &user_id, &product_id, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delivery_status_lifecycle() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 10).await;
    let (_, order) = place_order(&app, &user_id, &product_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap();
    let uri = format!("/api/orders/{order_id}/delivery");

    let (status, json) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["delivery_status"], "ORDERED");
    assert_eq!(json["ordered_at"], order["ordered_at"]);

    let (status, json) = send(
        &app,
        "PATCH",
        &uri,
        Some(json!({ "delivery_status": "SHIPPED" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["delivery_status"], "SHIPPED");

    let (_, json) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(json["delivery_status"], "SHIPPED");
}

#[tokio::test]
async fn test_update_with_unknown_status() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 10).await;
    let (_, order) = place_order(&app, &user_id, &product_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/orders/{order_id}/delivery"),
        Some(json!({ "delivery_status": "LOST" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/orders/{fake_id}/delivery"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/orders/not-a-uuid/delivery", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 100).await;
    let (_, order) = place_order(&app, &user_id, &product_id, 3).await;
    let order_id = order["order_id"].as_str().unwrap();
    assert_eq!(stock_of(&app, &product_id).await, 97);

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/orders/{order_id}/cancel"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["delivery_status"], "CANCELLED");
    assert_eq!(stock_of(&app, &product_id).await, 100);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/orders/{order_id}/cancel"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(stock_of(&app, &product_id).await, 100);
}

#[tokio::test]
async fn test_cancel_after_preparing_conflicts() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 10).await;
    let (_, order) = place_order(&app, &user_id, &product_id, 2).await;
    let order_id = order["order_id"].as_str().unwrap();

    send(
        &app,
        "PATCH",
        &format!("/api/orders/{order_id}/delivery"),
        Some(json!({ "delivery_status": "PREPARING" })),
        None,
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/orders/{order_id}/cancel"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("PREPARING"));
    assert_eq!(stock_of(&app, &product_id).await, 8);
}

#[tokio::test]
async fn test_product_catalog() {
    let app = setup();
    add_product(&app, "Widget", 10).await;
    add_product(&app, "Gadget", 0).await;

    let (status, json) = send(&app, "GET", "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        "POST",
        "/api/products",
        Some(json!({ "name": "Widget", "price": 1, "stock": 1 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/products",
        Some(json!({ "name": "Cheap", "price": -1, "stock": 1 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_registration_rules() {
    let app = setup();
    register_user(&app, "kim@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/users",
        Some(json!({ "name": "Kim", "email": "kim@example.com", "password": "pass1234" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/users",
        Some(json!({ "name": "Lee", "email": "lee@example.com", "password": "abc" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/users/admin",
        Some(json!({
            "name": "Mallory",
            "email": "mallory@example.com",
            "password": "pass1234",
            "admin_secret_key": "wrong",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_orders_access() {
    let app = setup();
    let kim = register_user(&app, "kim@example.com").await;
    let lee = register_user(&app, "lee@example.com").await;
    let admin = register_admin(&app).await;
    let product_id = add_product(&app, "Widget", 10).await;
    place_order(&app, &kim, &product_id, 1).await;
    place_order(&app, &kim, &product_id, 2).await;
    let uri = format!("/api/users/{kim}/orders");

    let (status, json) = send(&app, "GET", &uri, None, Some((kim.as_str(), "USER"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_orders"], 2);
    assert_eq!(json["orders"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "GET", &uri, None, Some((admin.as_str(), "ADMIN"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &uri, None, Some((lee.as_str(), "USER"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_deliveries_overview() {
    let app = setup();
    let kim = register_user(&app, "kim@example.com").await;
    let admin = register_admin(&app).await;
    let product_id = add_product(&app, "Widget", 10).await;
    place_order(&app, &kim, &product_id, 1).await;

    let (status, json) = send(
        &app,
        "GET",
        "/api/users/admin/deliveries",
        None,
        Some((admin.as_str(), "ADMIN")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let kim_row = rows.iter().find(|r| r["user_id"] == kim.as_str()).unwrap();
    assert_eq!(kim_row["total_orders"], 1);
    assert_eq!(kim_row["deliveries"][0]["delivery_status"], "ORDERED");

    let (status, _) = send(
        &app,
        "GET",
        "/api/users/admin/deliveries",
        None,
        Some((kim.as_str(), "USER")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_registration_disabled_without_secret() {
    let state = api::create_default_state(InMemoryStore::new(), None);
    let app = api::create_app(state, get_metrics_handle());

    let (status, _) = send(
        &app,
        "POST",
        "/api/users/admin",
        Some(json!({
            "name": "Admin",
            "email": "admin@example.com",
            "password": "admin1234",
            "admin_secret_key": ADMIN_SECRET,
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let user_id = register_user(&app, "kim@example.com").await;
    let product_id = add_product(&app, "Widget", 10).await;
    place_order(&app, &user_id, &product_id, 1).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
}
