//! Prometheus metrics endpoint and HTTP request tracking middleware.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const ORDERS_TOTAL: &str = "orders_total";
pub const STOCK_CLAMPED_TOTAL: &str = "stock_clamped_total";
pub const AUTH_ATTEMPTS_TOTAL: &str = "auth_attempts_total";
pub const PRODUCTS_ACTIVE: &str = "products_active";
pub const CUSTOMERS_TOTAL: &str = "customers_total";

/// Install the Prometheus recorder. Call once during startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_counter!(ORDERS_TOTAL, "Orders placed, by channel (pos/online)");
    describe_counter!(
        STOCK_CLAMPED_TOTAL,
        "Order lines that asked for more than the stock on hand"
    );
    describe_counter!(AUTH_ATTEMPTS_TOTAL, "Sign-in attempts by realm and outcome");
    describe_gauge!(PRODUCTS_ACTIVE, "Number of active catalog products");
    describe_gauge!(CUSTOMERS_TOTAL, "Number of registered shop customers");

    Ok(handle)
}

/// GET /metrics
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

async fn update_gauge_metrics(state: &AppState) {
    if let Ok(count) =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&state.db)
            .await
    {
        gauge!(PRODUCTS_ACTIVE).set(count as f64);
    }

    if let Ok(count) =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'customer'")
            .fetch_one(&state.db)
            .await
    {
        gauge!(CUSTOMERS_TOTAL).set(count as f64);
    }
}

/// Records `http_requests_total` and `http_request_duration_seconds` per matched route
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Use the route template so `/products/:id` stays one series
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

pub fn record_order_placed(is_pos: bool) {
    let channel = if is_pos { "pos" } else { "online" };
    counter!(ORDERS_TOTAL, "channel" => channel).increment(1);
}

pub fn record_stock_clamped() {
    counter!(STOCK_CLAMPED_TOTAL).increment(1);
}

/// `realm` is "shop" or "admin"; `outcome` one of success, invalid, unverified, forbidden
pub fn record_auth_attempt(realm: &'static str, outcome: &'static str) {
    counter!(AUTH_ATTEMPTS_TOTAL, "realm" => realm, "outcome" => outcome).increment(1);
}
