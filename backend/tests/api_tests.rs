//! HTTP API tests
//!
//! Drives the full router over the in-memory store: authentication, status
//! codes and the `{"error": {"code", "message", "field"?}}` envelope.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use inventory_manager_backend::config::{
    Config, DatabaseConfig, EventsConfig, JwtConfig, ServerConfig, StorageBackend, StorageConfig,
};
use inventory_manager_backend::middleware::Claims;
use inventory_manager_backend::store::MemoryStore;
use inventory_manager_backend::{create_app, AppState};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api-test-secret";

fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        storage: StorageConfig {
            backend: StorageBackend::Memory,
        },
        database: DatabaseConfig {
            url: "postgres://localhost/unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            run_migrations: false,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        events: EventsConfig {
            channel_capacity: 16,
        },
    }
}

fn app() -> Router {
    create_app(AppState::new(test_config(), Arc::new(MemoryStore::new())))
}

fn token_for(user_id: Uuid) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: None,
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn product_body(sku: &str, quantity: i64, reorder_level: i64) -> Value {
    json!({
        "name": format!("Item {}", sku),
        "sku": sku,
        "quantity": quantity,
        "reorder_level": reorder_level,
        "price": "12.50",
        "cost": "8.00"
    })
}

async fn create_product(app: &Router, token: &str, sku: &str, quantity: i64, level: i64) -> Value {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/v1/products",
            Some(token),
            Some(product_body(sku, quantity, level)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test that the health check is public
    #[tokio::test]
    async fn test_health_is_public() {
        let app = app();
        let (status, body) = send(&app, request(Method::GET, "/api/v1/health", None, None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    /// Test that protected routes require a valid bearer token
    #[tokio::test]
    async fn test_missing_or_bad_token_is_unauthorized() {
        let app = app();

        let (status, body) = send(&app, request(Method::GET, "/api/v1/products", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = send(
            &app,
            request(Method::GET, "/api/v1/products", Some("not-a-jwt"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    /// Test malformed bodies and path parameters map to validation errors
    #[tokio::test]
    async fn test_rejections_use_error_envelope() {
        let app = app();
        let token = token_for(Uuid::new_v4());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/products")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            request(Method::GET, "/api/v1/products/not-a-uuid", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    /// Test product creation, missing fields and duplicate SKUs
    #[tokio::test]
    async fn test_product_endpoints() {
        let app = app();
        let token = token_for(Uuid::new_v4());

        let product = create_product(&app, &token, "API-1", 10, 2).await;
        assert_eq!(product["sku"], "API-1");
        assert_eq!(product["quantity"], 10);

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/products",
                Some(&token),
                Some(json!({ "name": "No SKU" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MISSING_FIELD");
        assert_eq!(body["error"]["field"], "sku");

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/products",
                Some(&token),
                Some(product_body("API-1", 1, 1)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "DUPLICATE_ENTRY");

        let uri = format!("/api/v1/products/{}/add-quantity", product["id"].as_str().unwrap());
        let (status, body) = send(
            &app,
            request(Method::PATCH, &uri, Some(&token), Some(json!({}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MISSING_FIELD");

        let (status, body) = send(
            &app,
            request(Method::PATCH, &uri, Some(&token), Some(json!({ "added_quantity": 5 }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quantity"], 15);

        let other = token_for(Uuid::new_v4());
        let uri = format!("/api/v1/products/{}", product["id"].as_str().unwrap());
        let (status, body) = send(&app, request(Method::GET, &uri, Some(&other), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = send(&app, request(Method::DELETE, &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    /// Test recording a sale and the insufficient stock response
    #[tokio::test]
    async fn test_sale_endpoints() {
        let app = app();
        let token = token_for(Uuid::new_v4());
        let product = create_product(&app, &token, "API-SALE", 5, 3).await;
        let product_id = product["id"].as_str().unwrap();

        let (status, sale) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/sales",
                Some(&token),
                Some(json!({
                    "name": "Walk-in",
                    "items": [{ "product_id": product_id, "quantity": 2 }]
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", sale);
        assert_eq!(sale["total_amount"], "25.00");
        assert_eq!(sale["name"], "Walk-in");
        assert_eq!(sale["items"][0]["product"]["sku"], "API-SALE");

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/sales",
                Some(&token),
                Some(json!({ "items": [{ "product_id": product_id, "quantity": 10 }] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");

        let (status, body) = send(
            &app,
            request(Method::POST, "/api/v1/sales", Some(&token), Some(json!({ "items": [] }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MISSING_FIELD");

        let (status, alerts) = send(
            &app,
            request(Method::GET, "/api/v1/stock-alerts?status=active", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(alerts["total"], 1);
        assert_eq!(alerts["data"][0]["current_quantity"], 3);

        let (status, ledger) = send(
            &app,
            request(Method::GET, "/api/v1/stock-statements?type=out", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ledger["total"], 1);
        assert_eq!(ledger["data"][0]["type"], "out");

        let (status, sorted) = send(
            &app,
            request(
                Method::GET,
                "/api/v1/sales?sort=total_amount&order=asc",
                Some(&token),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sorted["total"], 1);

        let (status, _) = send(
            &app,
            request(Method::GET, "/api/v1/sales?sort=price", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/sales/{}", sale["id"].as_str().unwrap());
        let (status, body) = send(&app, request(Method::GET, &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], sale["id"]);
    }

    /// Test dismissing and reading alerts over HTTP
    #[tokio::test]
    async fn test_alert_endpoints() {
        let app = app();
        let token = token_for(Uuid::new_v4());
        let product = create_product(&app, &token, "API-ALERT", 1, 5).await;

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/v1/stock-alerts",
                Some(&token),
                Some(json!({ "product_id": product["id"] })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (_, alerts) = send(
            &app,
            request(Method::GET, "/api/v1/stock-alerts", Some(&token), None),
        )
        .await;
        let alert_id = alerts["data"][0]["id"].as_str().unwrap().to_string();

        let dismiss = format!("/api/v1/stock-alerts/{}/dismiss", alert_id);
        let (status, body) = send(&app, request(Method::PATCH, &dismiss, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "dismissed");

        let (status, body) = send(&app, request(Method::PATCH, &dismiss, Some(&token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let read = format!("/api/v1/stock-alerts/{}/read", alert_id);
        let (status, body) = send(&app, request(Method::PATCH, &read, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_read"], true);
    }
}
