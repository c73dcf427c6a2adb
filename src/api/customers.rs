//! Admin CRM over the shop's `users` table.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::auth::{hash_password, normalize_email};
use super::error::{ApiError, ValidationErrorBuilder};
use super::session::StaffSession;
use super::validation::{validate_email, validate_name, validate_password};
use crate::db::{
    encode_json, now_timestamp, CreateCustomerRequest, Order, OrderResponse, StaffRole,
    UpdateCustomerRequest, User, UserResponse, UserRole,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: UserResponse,
    pub orders: Vec<OrderResponse>,
}

async fn fetch_user(state: &AppState, id: &str) -> Result<Option<User>, ApiError> {
    Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?)
}

fn hash_or_internal(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create customer")
    })
}

/// GET /api/admin/customers
pub async fn list(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    session.authorize(StaffRole::can_manage_customers)?;

    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// GET /api/admin/customers/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<String>,
) -> Result<Json<CustomerDetail>, ApiError> {
    session.authorize(StaffRole::can_manage_customers)?;

    let user = fetch_user(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC")
            .bind(&id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(CustomerDetail {
        customer: user.into(),
        orders: orders.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/admin/customers
///
/// Staff-created customers are trusted as verified. Without a password the
/// account can only sign in through Google.
pub async fn create(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    session.authorize(StaffRole::can_manage_customers)?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&req.email));
    if let Some(name) = &req.name {
        errors.check("name", validate_name(name));
    }
    if let Some(password) = &req.password {
        errors.check("password", validate_password(password));
    }
    errors.finish()?;

    let password_hash = req.password.as_deref().map(hash_or_internal).transpose()?;
    let role = req.role.unwrap_or(UserRole::Customer);
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, email_verified, password_hash, role, image, phone, address, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(normalize_email(&req.email))
    .bind(&now)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(&req.image)
    .bind(&req.phone)
    .bind(encode_json(req.address.as_ref()))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(customer_id = %id, by = %session.claims.id, "Customer created");

    let user = fetch_user(&state, &id)
        .await?
        .ok_or_else(|| ApiError::internal("Customer vanished after insert"))?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// PUT /api/admin/customers
pub async fn update(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    session.authorize(StaffRole::can_manage_customers)?;

    if req.id.trim().is_empty() {
        return Err(ApiError::bad_request("Customer ID required"));
    }

    let mut user = fetch_user(&state, &req.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(email) = &req.email {
        errors.check("email", validate_email(email));
    }
    if let Some(name) = &req.name {
        errors.check("name", validate_name(name));
    }
    if let Some(password) = &req.password {
        errors.check("password", validate_password(password));
    }
    errors.finish()?;

    if let Some(name) = req.name {
        user.name = Some(name.trim().to_string());
    }
    if let Some(email) = req.email {
        user.email = normalize_email(&email);
    }
    if let Some(password) = req.password {
        user.password_hash = Some(hash_or_internal(&password)?);
    }
    if let Some(phone) = req.phone {
        user.phone = Some(phone);
    }
    if let Some(address) = req.address {
        user.address = encode_json(Some(&address));
    }
    if let Some(image) = req.image {
        user.image = Some(image);
    }
    if let Some(role) = req.role {
        user.role = role.to_string();
    }
    user.updated_at = now_timestamp();

    sqlx::query(
        r#"
        UPDATE users SET name = ?, email = ?, password_hash = ?, role = ?, image = ?,
            phone = ?, address = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(&user.image)
    .bind(&user.phone)
    .bind(&user.address)
    .bind(&user.updated_at)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    tracing::info!(customer_id = %user.id, by = %session.claims.id, "Customer updated");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::auth::verify_password;
    use crate::api::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_without_password() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let manager = staff_cookie(&state, "manager");

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/customers",
            json!({
                "email": "Walk.In@Example.com",
                "name": "Walk In",
                "address": { "city": "Accra" }
            }),
            Some(&manager),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "walk.in@example.com");
        assert_eq!(body["role"], "customer");
        assert_eq!(body["address"]["city"], "Accra");
        assert!(body["emailVerified"].is_string());
        assert!(body.get("passwordHash").is_none());

        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE email = 'walk.in@example.com'")
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert!(hash.is_none());
    }

    #[tokio::test]
    async fn test_update_rehashes_password() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_customer(&state.db, "c@example.com", Some("oldpass"), true, "customer").await;

        let (status, _) = send_json(
            &app,
            Method::PUT,
            "/api/admin/customers",
            json!({ "name": "Renamed" }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(
            &app,
            Method::PUT,
            "/api/admin/customers",
            json!({ "id": id, "password": "newpass", "phone": "555-0100" }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "555-0100");
        assert_eq!(body["name"], "Test User");

        let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert!(verify_password("newpass", &hash));
    }

    #[tokio::test]
    async fn test_detail_includes_orders_newest_first() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_customer(&state.db, "buyer@example.com", None, true, "customer").await;

        for (number, at) in [("ORD-OLD", "2026-01-01T10:00:00Z"), ("ORD-NEW", "2026-02-01T10:00:00Z")] {
            sqlx::query(
                "INSERT INTO orders (order_number, user_id, subtotal, total, created_at, updated_at) VALUES (?, ?, '10.00', '10.00', ?, ?)",
            )
            .bind(number)
            .bind(&id)
            .bind(at)
            .bind(at)
            .execute(&state.db)
            .await
            .unwrap();
        }

        let (status, body) = send_json(
            &app,
            Method::GET,
            &format!("/api/admin/customers/{}", id),
            json!(null),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "buyer@example.com");
        assert_eq!(body["orders"][0]["orderNumber"], "ORD-NEW");
        assert_eq!(body["orders"][1]["orderNumber"], "ORD-OLD");

        let (status, _) = send_json(
            &app,
            Method::GET,
            "/api/admin/customers/missing",
            json!(null),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cashier_has_no_crm_access() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let cashier = staff_cookie(&state, "cashier");

        let (status, _) =
            send_json(&app, Method::GET, "/api/admin/customers", json!(null), Some(&cashier)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
