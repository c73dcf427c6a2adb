//! Shared fixtures for handler tests: an in-memory state, the real router and
//! helpers for driving it with `oneshot`.

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use super::auth::hash_password;
use super::create_router;
use super::session::{Realm, SessionSubject};
use crate::config::Config;
use crate::db::{connect_in_memory, now_timestamp};
use crate::{AppState, DbPool};

pub async fn test_state() -> Arc<AppState> {
    test_state_with(|_| {}).await
}

pub async fn test_state_with(configure: impl FnOnce(&mut Config)) -> Arc<AppState> {
    let mut config = Config::default();
    config.auth.secret = "test-secret".to_string();
    configure(&mut config);
    let db = connect_in_memory().await.unwrap();
    Arc::new(AppState::new(config, db))
}

pub fn test_app(state: Arc<AppState>) -> Router {
    create_router(state)
}

pub fn json_request(method: Method, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = if body.is_null() {
        Body::empty()
    } else {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(body.to_string())
    };
    builder.body(body).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

/// Send a JSON request and decode the JSON response (`Value::Null` for empty bodies)
pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Value,
    cookie: Option<&str>,
) -> (StatusCode, Value) {
    let response = send(app, json_request(method, uri, body, cookie)).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// `name=value` of the named cookie set by a response
pub fn set_cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Cookie header value for a staff session with an arbitrary role string
pub fn staff_cookie(state: &AppState, role: &str) -> String {
    let token = state
        .sessions
        .issue(
            Realm::Staff,
            &SessionSubject {
                id: format!("staff-{}", role),
                email: format!("{}@defrost.com", role),
                name: Some(role.to_string()),
                picture: None,
                role: role.to_string(),
            },
        )
        .unwrap();
    format!("{}={}", Realm::Staff.cookie_name(false), token)
}

/// Cookie header value for a customer-realm session
pub fn customer_cookie(state: &AppState, user_id: &str, role: &str) -> String {
    let token = state
        .sessions
        .issue(
            Realm::Customer,
            &SessionSubject {
                id: user_id.to_string(),
                email: format!("{}@example.com", user_id),
                name: None,
                picture: None,
                role: role.to_string(),
            },
        )
        .unwrap();
    format!("{}={}", Realm::Customer.cookie_name(false), token)
}

pub async fn insert_customer(
    db: &DbPool,
    email: &str,
    password: Option<&str>,
    verified: bool,
    role: &str,
) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let hash = password.map(|p| hash_password(p).unwrap());
    sqlx::query(
        "INSERT INTO users (id, name, email, email_verified, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind("Test User")
    .bind(email)
    .bind(if verified { Some(now.clone()) } else { None })
    .bind(hash)
    .bind(role)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .unwrap();
    id
}

pub async fn insert_product(db: &DbPool, sku: &str, price: &str, stock: i64) -> i64 {
    let now = now_timestamp();
    let result = sqlx::query(
        "INSERT INTO products (sku, name, slug, price, stock_quantity, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(sku)
    .bind(format!("Product {}", sku))
    .bind(sku.to_lowercase())
    .bind(price)
    .bind(stock)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .unwrap();
    result.last_insert_rowid()
}

pub async fn stock_of(db: &DbPool, product_id: i64) -> i64 {
    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_one(db)
        .await
        .unwrap()
}
