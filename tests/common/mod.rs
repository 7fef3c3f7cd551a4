#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use custgate::{ServerConfig, create_app, db::Database, token::DEFAULT_ISSUER};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-32-bytes";
pub const PASSWORD: &str = "hunter2-but-longer";

/// Create a test app backed by a fresh in-memory database.
pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        issuer: DEFAULT_ISSUER.to_string(),
        token_ttl_secs: 15 * 24 * 60 * 60,
        lookup_timeout: Duration::from_secs(5),
    };
    (create_app(&config).expect("Failed to build app"), db)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Send a request through the app and collect the response.
pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn registration(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
        "age": 30,
        "gender": "FEMALE",
    })
}

/// Register a customer and return the token from the `Authorization` header.
pub async fn register(app: &Router, name: &str, email: &str) -> String {
    let response = send(
        app,
        json_request("POST", "/api/v1/customers", None, registration(name, email)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "registration failed");
    response
        .headers
        .get(header::AUTHORIZATION)
        .expect("registration should return a token")
        .to_str()
        .unwrap()
        .to_string()
}
