mod accounting;
mod admin_auth;
pub mod auth;
mod cart;
mod categories;
mod customers;
mod dashboard;
pub mod error;
mod expenses;
pub mod guard;
pub mod metrics;
pub mod oauth;
mod orders;
mod products;
mod profile;
pub mod rate_limit;
pub mod session;
mod site_settings;
pub mod validation;

#[cfg(test)]
pub mod test_support;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use self::error::ApiError;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Shop auth (rate limited up to the first unlimited route)
    let shop_auth_routes = Router::new()
        .route("/send-verification-code", post(auth::send_verification_code))
        .route("/verify-and-register", post(auth::verify_and_register))
        .route("/signin", post(auth::signin))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_shop_auth,
        ))
        .route("/signout", post(auth::signout))
        .route("/session", get(auth::session))
        .route("/google", get(oauth::google_start))
        .route("/google/callback", get(oauth::google_callback));

    // Staff auth and bootstrap seeding
    let staff_auth_routes = Router::new()
        .route("/auth/signin", post(admin_auth::signin))
        .route("/seed", post(admin_auth::seed))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_staff_auth,
        ))
        .route("/auth/signout", post(admin_auth::signout))
        .route("/auth/session", get(admin_auth::session));

    // Back office. Every handler takes a StaffSession and checks its permission.
    let admin_routes = Router::new()
        // Catalog
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/:id",
            get(products::get)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/categories", get(categories::list).post(categories::create))
        // CRM
        .route(
            "/customers",
            get(customers::list)
                .post(customers::create)
                .put(customers::update),
        )
        .route("/customers/:id", get(customers::get))
        // Sales
        .route("/orders", get(orders::list).post(orders::create))
        .route("/orders/:id", get(orders::get))
        // Finance
        .route("/expenses", get(expenses::list).post(expenses::create))
        .route("/accounting/summary", get(accounting::summary))
        // Storefront content
        .route(
            "/site-settings",
            get(site_settings::list).post(site_settings::upsert),
        )
        // Dashboard
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/dashboard/recent-orders", get(dashboard::recent_orders))
        .route("/dashboard/low-stock", get(dashboard::low_stock))
        .merge(staff_auth_routes);

    // Public catalog and the signed-in customer's own data
    let shop_routes = Router::new()
        .route("/products", get(products::list_public))
        .route("/products/:id", get(products::get_public))
        .route("/cart", get(cart::list).post(cart::add))
        .route("/cart/:id", axum::routing::delete(cart::remove))
        .route("/profile", get(profile::get).put(profile::update))
        .route("/profile/orders", get(profile::orders));

    // Built storefront and admin pages, with SPA fallback
    let static_dir = state.config.server.static_dir.clone();
    let serve_pages =
        ServeDir::new(&static_dir).not_found_service(ServeFile::new(static_dir.join("index.html")));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api/auth", shop_auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api", shop_routes)
        .route("/api/*rest", any(api_not_found))
        .fallback_service(serve_pages)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::page_guard,
        ))
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config.server.cors_origins) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// CORS for configured cross-origin frontends; `None` keeps the API same-origin
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
            .max_age(Duration::from_secs(60 * 60)),
    )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("Not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    const ADMIN_WRITES: &[(&str, &str)] = &[
        ("POST", "/api/admin/products"),
        ("PUT", "/api/admin/products/1"),
        ("DELETE", "/api/admin/products/1"),
        ("POST", "/api/admin/categories"),
        ("POST", "/api/admin/customers"),
        ("PUT", "/api/admin/customers"),
        ("POST", "/api/admin/orders"),
        ("POST", "/api/admin/expenses"),
        ("POST", "/api/admin/site-settings"),
        ("POST", "/api/admin/seed"),
    ];

    #[tokio::test]
    async fn test_customer_role_denied_on_every_admin_write() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let cookie = staff_cookie(&state, "customer");
        let product = insert_product(&state.db, "KEEP-1", "10.00", 5).await;
        assert_eq!(product, 1);

        for (method, uri) in ADMIN_WRITES {
            let method: Method = method.parse().unwrap();
            let (status, body) = send_json(&app, method.clone(), uri, json!({}), Some(&cookie)).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
            assert_eq!(body["error"], "Access denied. Admin credentials required.");
        }

        let (active, stock): (bool, i64) =
            sqlx::query_as("SELECT is_active, stock_quantity FROM products WHERE id = 1")
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert!(active);
        assert_eq!(stock, 5);
    }

    #[tokio::test]
    async fn test_admin_reads_need_a_session() {
        let state = test_state().await;
        let app = test_app(state);

        for uri in [
            "/api/admin/products",
            "/api/admin/orders",
            "/api/admin/dashboard/stats",
            "/api/admin/accounting/summary",
        ] {
            let (status, body) = send_json(&app, Method::GET, uri, json!(null), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body["error"], "Unauthorized. Please login to continue.");
        }
    }

    #[tokio::test]
    async fn test_health_and_unknown_api_route() {
        let state = test_state().await;
        let app = test_app(state);

        let (status, _) = send_json(&app, Method::GET, "/health", json!(null), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(&app, Method::GET, "/api/nope", json!(null), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[test]
    fn test_cors_layer_only_with_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["https://shop.example.com".to_string()]).is_some());
    }
}
