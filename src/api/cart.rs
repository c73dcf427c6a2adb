use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::auth::require_shopper;
use super::error::ApiError;
use super::session::CustomerSession;
use super::validation::validate_quantity;
use crate::db::{now_timestamp, AddToCartRequest, CartLine};
use crate::AppState;

const CART_LINE_SELECT: &str = r#"
    SELECT c.id, c.product_id, c.quantity, c.size, c.color, c.added_at,
           p.name AS product_name, p.slug AS product_slug, p.price, p.stock_quantity
    FROM cart c
    JOIN products p ON p.id = c.product_id
"#;

/// GET /api/cart
pub async fn list(
    State(state): State<Arc<AppState>>,
    CustomerSession(claims): CustomerSession,
) -> Result<Json<Vec<CartLine>>, ApiError> {
    require_shopper(&claims)?;
    let lines = sqlx::query_as::<_, CartLine>(&format!(
        "{} WHERE c.user_id = ? ORDER BY c.added_at, c.id",
        CART_LINE_SELECT
    ))
    .bind(&claims.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(lines))
}

/// POST /api/cart
pub async fn add(
    State(state): State<Arc<AppState>>,
    CustomerSession(claims): CustomerSession,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    require_shopper(&claims)?;
    validate_quantity(req.quantity).map_err(|e| ApiError::validation_field("quantity", e))?;

    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM products WHERE id = ?")
        .bind(req.product_id)
        .fetch_optional(&state.db)
        .await?;
    if active != Some(true) {
        return Err(ApiError::not_found("Product not found"));
    }

    let result = sqlx::query(
        "INSERT INTO cart (user_id, product_id, quantity, size, color, added_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&claims.id)
    .bind(req.product_id)
    .bind(req.quantity)
    .bind(&req.size)
    .bind(&req.color)
    .bind(now_timestamp())
    .execute(&state.db)
    .await?;

    let line = sqlx::query_as::<_, CartLine>(&format!("{} WHERE c.id = ?", CART_LINE_SELECT))
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// DELETE /api/cart/:id
pub async fn remove(
    State(state): State<Arc<AppState>>,
    CustomerSession(claims): CustomerSession,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_shopper(&claims)?;
    let result = sqlx::query("DELETE FROM cart WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(&claims.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Cart item not found"));
    }
    Ok(Json(json!({ "success": true })))
}
