//! Order listing and placement. Placement is used by the POS checkout and by
//! staff entering orders on a customer's behalf.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rand::{distr::Alphanumeric, Rng};
use rust_decimal::Decimal;
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::{record_order_placed, record_stock_clamped};
use super::session::StaffSession;
use super::validation::validate_quantity;
use crate::db::{
    encode_json, now_timestamp, CreateOrderRequest, Order, OrderItem, OrderResponse, OrderStatus,
    PaymentStatus, StaffRole,
};
use crate::money::{
    checked_total, format_money, line_total, money_eq, parse_money, require_non_negative, round_money,
    MoneyError,
};
use crate::AppState;

/// `ORD-` followed by eight uppercase alphanumerics
fn generate_order_number() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("ORD-{}", suffix.to_uppercase())
}

/// A request line resolved against the product table
struct PricedLine {
    product_id: i64,
    product_name: String,
    size: Option<String>,
    color: Option<String>,
    quantity: i64,
    unit_price: Decimal,
    total_price: Decimal,
}

pub(crate) async fn fetch_order_items(
    state: &AppState,
    order_id: i64,
) -> Result<Vec<OrderItem>, ApiError> {
    Ok(
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = ? ORDER BY id")
            .bind(order_id)
            .fetch_all(&state.db)
            .await?,
    )
}

/// GET /api/admin/orders
pub async fn list(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let orders: Vec<Order> = sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC, id DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /api/admin/orders/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    let items = fetch_order_items(&state, id).await?;
    Ok(Json(OrderResponse::from(order).with_items(items)))
}

/// POST /api/admin/orders
///
/// The order row, its items and the stock decrements commit together or not
/// at all. Stock never goes below zero.
pub async fn create(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    session.authorize(StaffRole::can_sell)?;

    if req.items.is_empty() {
        return Err(ApiError::bad_request("No items in order"));
    }

    let mut errors = ValidationErrorBuilder::new();
    for (i, item) in req.items.iter().enumerate() {
        errors.check(&format!("items[{}].quantity", i), validate_quantity(item.quantity));
    }
    errors.finish()?;

    let tax = require_non_negative(req.tax.unwrap_or_default(), "tax")?;
    let shipping_cost = require_non_negative(req.shipping_cost.unwrap_or_default(), "shippingCost")?;
    let discount = require_non_negative(req.discount.unwrap_or_default(), "discount")?;

    let mut tx = state.db.begin().await?;

    let mut lines = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let product: Option<(String, String)> =
            sqlx::query_as("SELECT name, price FROM products WHERE id = ?")
                .bind(item.product_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (name, price) = product.ok_or_else(|| {
            ApiError::bad_request(format!("Product {} not found", item.product_id))
        })?;

        let unit_price = match item.price {
            Some(price) => require_non_negative(price, "price")?,
            None => parse_money(&price)?,
        };
        lines.push(PricedLine {
            product_id: item.product_id,
            product_name: item
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(name),
            size: item.size.clone(),
            color: item.color.clone(),
            quantity: item.quantity,
            unit_price: round_money(unit_price),
            total_price: line_total(unit_price, item.quantity)?,
        });
    }

    let subtotal = checked_total(lines.iter().map(|l| l.total_price))?;
    let total = checked_total([subtotal, tax, shipping_cost])?
        .checked_sub(discount)
        .ok_or(MoneyError::Overflow)?;
    if total.is_sign_negative() && !total.is_zero() {
        return Err(ApiError::bad_request("Discount exceeds the order value"));
    }
    if let Some(client_total) = req.total {
        if !money_eq(client_total, total) {
            tracing::warn!(
                client_total = %client_total,
                computed_total = %total,
                "Rejecting order with mismatched total"
            );
            return Err(ApiError::bad_request(format!(
                "Order total does not match items (expected {})",
                format_money(total)
            )));
        }
    }

    let order_number = generate_order_number();
    let now = now_timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO orders (
            order_number, user_id, customer_name, customer_email, customer_phone,
            shipping_address, billing_address, subtotal, tax, shipping_cost, discount, total,
            status, payment_status, payment_method, transaction_id, notes, is_pos_order,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&order_number)
    .bind(&req.customer_id)
    .bind(&req.customer_name)
    .bind(&req.customer_email)
    .bind(&req.customer_phone)
    .bind(encode_json(req.shipping_address.as_ref()))
    .bind(encode_json(req.billing_address.as_ref()))
    .bind(format_money(subtotal))
    .bind(format_money(tax))
    .bind(format_money(shipping_cost))
    .bind(format_money(discount))
    .bind(format_money(total))
    .bind(OrderStatus::Delivered.as_str())
    .bind(PaymentStatus::Paid.as_str())
    .bind(req.payment_method.map(|m| m.as_str()))
    .bind(&req.transaction_id)
    .bind(&req.notes)
    .bind(req.is_pos)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    let order_id = result.last_insert_rowid();

    for line in &lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, size, color, quantity, unit_price, total_price, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.size)
        .bind(&line.color)
        .bind(line.quantity)
        .bind(format_money(line.unit_price))
        .bind(format_money(line.total_price))
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let on_hand: i64 = sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?")
            .bind(line.product_id)
            .fetch_one(&mut *tx)
            .await?;
        if line.quantity > on_hand {
            tracing::warn!(
                order_number = %order_number,
                product_id = line.product_id,
                requested = line.quantity,
                on_hand,
                "Order line exceeds stock, clamping to zero"
            );
            record_stock_clamped();
        }

        sqlx::query(
            "UPDATE products SET stock_quantity = MAX(0, stock_quantity - ?), updated_at = ? WHERE id = ?",
        )
        .bind(line.quantity)
        .bind(&now)
        .bind(line.product_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    record_order_placed(req.is_pos);
    tracing::info!(
        order_number = %order_number,
        total = %format_money(total),
        lines = lines.len(),
        pos = req.is_pos,
        by = %session.claims.id,
        "Order placed"
    );

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_one(&state.db)
        .await?;
    let items = fetch_order_items(&state, order_id).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(order).with_items(items))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use axum::http::Method;
    use serde_json::json;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert_eq!(number.len(), 12);
        assert!(number.starts_with("ORD-"));
        assert!(number[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_pos_order_decrements_stock() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let cashier = staff_cookie(&state, "cashier");
        let tee = insert_product(&state.db, "TEE-1", "20.00", 10).await;
        let cap = insert_product(&state.db, "CAP-1", "7.50", 4).await;

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({
                "items": [
                    { "productId": tee, "quantity": 2, "size": "M" },
                    { "productId": cap, "quantity": 1, "price": 5, "name": "Cap (promo)" }
                ],
                "paymentMethod": "cash",
                "total": 45,
                "isPos": true
            }),
            Some(&cashier),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["subtotal"], "45.00");
        assert_eq!(body["total"], "45.00");
        assert_eq!(body["status"], "delivered");
        assert_eq!(body["paymentStatus"], "paid");
        assert_eq!(body["isPosOrder"], true);
        assert_eq!(body["items"][0]["productName"], "Product TEE-1");
        assert_eq!(body["items"][0]["unitPrice"], "20.00");
        assert_eq!(body["items"][0]["totalPrice"], "40.00");
        assert_eq!(body["items"][1]["productName"], "Cap (promo)");

        assert_eq!(stock_of(&state.db, tee).await, 8);
        assert_eq!(stock_of(&state.db, cap).await, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_clamps_at_zero() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_product(&state.db, "LOW-1", "10.00", 2).await;

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({ "items": [{ "productId": id, "quantity": 5 }], "isPos": true }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(stock_of(&state.db, id).await, 0);
    }

    #[tokio::test]
    async fn test_missing_product_rolls_back_everything() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_product(&state.db, "OK-1", "10.00", 5).await;

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({
                "items": [
                    { "productId": id, "quantity": 1 },
                    { "productId": 9999, "quantity": 1 }
                ]
            }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Product 9999 not found");

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&state.db)
            .await
            .unwrap();
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!((orders, items), (0, 0));
        assert_eq!(stock_of(&state.db, id).await, 5);
    }

    #[tokio::test]
    async fn test_total_checked_against_lines() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_product(&state.db, "TOT-1", "19.99", 5).await;

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({ "items": [{ "productId": id, "quantity": 2 }], "total": 30 }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(stock_of(&state.db, id).await, 5);

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({
                "items": [{ "productId": id, "quantity": 2 }],
                "tax": "3.00",
                "discount": "1.98",
                "total": "41"
            }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["total"], "41.00");
    }

    #[tokio::test]
    async fn test_out_of_range_amounts_rejected() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let cashier = staff_cookie(&state, "cashier");
        let id = insert_product(&state.db, "BIG-1", "10.00", 5).await;
        let huge = "79228162514264337593543950335";

        for body in [
            json!({ "items": [{ "productId": id, "quantity": 2, "price": huge }] }),
            json!({ "items": [{ "productId": id, "quantity": 1 }], "tax": huge }),
            json!({ "items": [{ "productId": id, "quantity": 1 }], "total": format!("-{}", huge) }),
        ] {
            let (status, _) =
                send_json(&app, Method::POST, "/api/admin/orders", body, Some(&cashier)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        // A price stored before amounts were capped still cannot overflow a line
        let legacy = insert_product(&state.db, "BIG-2", huge, 5).await;
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({ "items": [{ "productId": legacy, "quantity": 2 }] }),
            Some(&cashier),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Amount is out of range");

        assert_eq!(stock_of(&state.db, id).await, 5);
        assert_eq!(stock_of(&state.db, legacy).await, 5);
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(orders, 0);
    }

    #[tokio::test]
    async fn test_empty_and_invalid_lines() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_product(&state.db, "Q-1", "1.00", 5).await;

        let (status, body) =
            send_json(&app, Method::POST, "/api/admin/orders", json!({ "items": [] }), Some(&admin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No items in order");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({ "items": [{ "productId": id, "quantity": 0 }] }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_with_items_and_list() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let manager = staff_cookie(&state, "manager");
        let id = insert_product(&state.db, "G-1", "3.00", 5).await;

        let (_, created) = send_json(
            &app,
            Method::POST,
            "/api/admin/orders",
            json!({ "items": [{ "productId": id, "quantity": 3 }], "customerName": "Ama" }),
            Some(&manager),
        )
        .await;
        let order_id = created["id"].as_i64().unwrap();

        let (status, body) = send_json(
            &app,
            Method::GET,
            &format!("/api/admin/orders/{}", order_id),
            json!(null),
            Some(&manager),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["customerName"], "Ama");
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (_, body) =
            send_json(&app, Method::GET, "/api/admin/orders", json!(null), Some(&manager)).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert!(body[0].get("items").is_none());
    }
}
