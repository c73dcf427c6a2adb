//! The signed-in customer's own account and order history.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::auth::require_shopper;
use super::error::ApiError;
use super::session::{Claims, CustomerSession};
use super::validation::validate_name;
use crate::db::{encode_json, now_timestamp, Order, OrderResponse, UpdateProfileRequest, User, UserResponse};
use crate::AppState;

async fn fetch_self(state: &AppState, claims: &Claims) -> Result<User, ApiError> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&claims.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// GET /api/profile
pub async fn get(
    State(state): State<Arc<AppState>>,
    CustomerSession(claims): CustomerSession,
) -> Result<Json<UserResponse>, ApiError> {
    require_shopper(&claims)?;
    Ok(Json(fetch_self(&state, &claims).await?.into()))
}

/// PUT /api/profile
pub async fn update(
    State(state): State<Arc<AppState>>,
    CustomerSession(claims): CustomerSession,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_shopper(&claims)?;
    if let Some(name) = &req.name {
        validate_name(name).map_err(|e| ApiError::validation_field("name", e))?;
    }

    let mut user = fetch_self(&state, &claims).await?;
    if let Some(name) = req.name {
        user.name = Some(name.trim().to_string());
    }
    if let Some(phone) = req.phone {
        user.phone = Some(phone);
    }
    if let Some(address) = req.address {
        user.address = encode_json(Some(&address));
    }
    user.updated_at = now_timestamp();

    sqlx::query("UPDATE users SET name = ?, phone = ?, address = ?, updated_at = ? WHERE id = ?")
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.updated_at)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    Ok(Json(user.into()))
}

/// GET /api/profile/orders
pub async fn orders(
    State(state): State<Arc<AppState>>,
    CustomerSession(claims): CustomerSession,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    require_shopper(&claims)?;

    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC")
            .bind(&claims.id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}
