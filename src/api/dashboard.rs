//! Admin dashboard widgets: headline stats, recent orders and low stock.

use axum::{extract::State, Json};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use super::error::ApiError;
use super::session::StaffSession;
use crate::db::{format_timestamp, DbPool, LowStockProduct, RecentOrder, StaffRole};
use crate::money::{format_money, pct_change, sum_money};
use crate::AppState;

const RECENT_ORDERS_LIMIT: i64 = 10;

/// Calendar month windows in UTC. Last month is `[last_start, this_start)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthWindows {
    pub last_start: String,
    pub this_start: String,
}

fn first_of_month(year: i32, month: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| format_timestamp(dt.and_utc()))
}

pub fn month_windows(now: DateTime<Utc>) -> Option<MonthWindows> {
    let (year, month) = (now.year(), now.month());
    let (last_year, last_month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
    Some(MonthWindows {
        last_start: first_of_month(last_year, last_month)?,
        this_start: first_of_month(year, month)?,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_sales: String,
    pub total_orders: i64,
    pub total_products: i64,
    pub total_customers: i64,
    pub sales_change: i64,
    pub orders_change: i64,
    pub revenue_change: i64,
    pub customers_change: i64,
}

async fn paid_sales_between(db: &DbPool, from: &str, until: Option<&str>) -> Result<Decimal, ApiError> {
    let totals: Vec<String> = match until {
        Some(until) => {
            sqlx::query_scalar(
                "SELECT total FROM orders WHERE payment_status = 'paid' AND created_at >= ? AND created_at < ?",
            )
            .bind(from)
            .bind(until)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT total FROM orders WHERE payment_status = 'paid' AND created_at >= ?")
                .bind(from)
                .fetch_all(db)
                .await?
        }
    };
    Ok(sum_money(totals.iter().map(String::as_str))?)
}

async fn count_between(db: &DbPool, table_filter: &str, from: &str, until: Option<&str>) -> Result<i64, ApiError> {
    let sql = match until {
        Some(_) => format!("SELECT COUNT(*) FROM {} AND created_at >= ? AND created_at < ?", table_filter),
        None => format!("SELECT COUNT(*) FROM {} AND created_at >= ?", table_filter),
    };
    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(from);
    if let Some(until) = until {
        query = query.bind(until);
    }
    Ok(query.fetch_one(db).await?)
}

const ORDERS: &str = "orders WHERE 1 = 1";
const CUSTOMERS: &str = "users WHERE role = 'customer'";

/// Dashboard numbers as of `now`
pub async fn compute_stats(db: &DbPool, now: DateTime<Utc>) -> Result<DashboardStats, ApiError> {
    let windows =
        month_windows(now).ok_or_else(|| ApiError::internal("Could not compute month boundaries"))?;
    let (last, this) = (windows.last_start.as_str(), windows.this_start.as_str());

    let sales = paid_sales_between(db, this, None).await?;
    let last_sales = paid_sales_between(db, last, Some(this)).await?;

    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(db)
        .await?;
    let orders = count_between(db, ORDERS, this, None).await?;
    let last_orders = count_between(db, ORDERS, last, Some(this)).await?;

    let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
        .fetch_one(db)
        .await?;

    let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'customer'")
        .fetch_one(db)
        .await?;
    let customers = count_between(db, CUSTOMERS, this, None).await?;
    let last_customers = count_between(db, CUSTOMERS, last, Some(this)).await?;

    let revenue_change = pct_change(sales, last_sales);
    Ok(DashboardStats {
        total_sales: format_money(sales),
        total_orders,
        total_products,
        total_customers,
        sales_change: revenue_change,
        orders_change: pct_change(Decimal::from(orders), Decimal::from(last_orders)),
        revenue_change,
        customers_change: pct_change(Decimal::from(customers), Decimal::from(last_customers)),
    })
}

/// GET /api/admin/dashboard/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<DashboardStats>, ApiError> {
    session.authorize(StaffRole::can_view)?;
    Ok(Json(compute_stats(&state.db, Utc::now()).await?))
}

/// GET /api/admin/dashboard/recent-orders
pub async fn recent_orders(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<RecentOrder>>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let orders = sqlx::query_as::<_, RecentOrder>(
        r#"
        SELECT id, order_number, customer_name, total, status, payment_status, created_at
        FROM orders
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(RECENT_ORDERS_LIMIT)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(orders))
}

/// GET /api/admin/dashboard/low-stock
pub async fn low_stock(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<LowStockProduct>>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let products = sqlx::query_as::<_, LowStockProduct>(
        r#"
        SELECT id, name, sku, stock_quantity, low_stock_threshold
        FROM products
        WHERE is_active = 1 AND stock_quantity <= low_stock_threshold
        ORDER BY stock_quantity ASC, id ASC
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(products))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use axum::http::{Method, StatusCode};
    use chrono::TimeZone;
    use serde_json::json;

    async fn insert_order(db: &DbPool, number: &str, total: &str, payment: &str, at: &str) {
        sqlx::query(
            "INSERT INTO orders (order_number, subtotal, total, payment_status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(number)
        .bind(total)
        .bind(total)
        .bind(payment)
        .bind(at)
        .bind(at)
        .execute(db)
        .await
        .unwrap();
    }

    #[test]
    fn test_month_windows() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let w = month_windows(now).unwrap();
        assert_eq!(w.last_start, "2026-02-01T00:00:00Z");
        assert_eq!(w.this_start, "2026-03-01T00:00:00Z");

        let january = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let w = month_windows(january).unwrap();
        assert_eq!(w.last_start, "2025-12-01T00:00:00Z");
        assert_eq!(w.this_start, "2026-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_stats_month_over_month() {
        let state = test_state().await;
        let db = &state.db;
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();

        insert_order(db, "ORD-A", "100.00", "paid", "2026-02-10T09:00:00Z").await;
        // Last second of February belongs to last month
        insert_order(db, "ORD-B", "50.00", "paid", "2026-02-28T23:59:59Z").await;
        insert_order(db, "ORD-C", "120.00", "paid", "2026-03-01T00:00:00Z").await;
        insert_order(db, "ORD-D", "60.00", "paid", "2026-03-10T00:00:00Z").await;
        insert_order(db, "ORD-E", "999.00", "pending", "2026-03-11T00:00:00Z").await;
        insert_product(db, "S-1", "1.00", 1).await;

        let stats = compute_stats(db, now).await.unwrap();
        assert_eq!(stats.total_sales, "180.00");
        assert_eq!(stats.total_orders, 5);
        assert_eq!(stats.total_products, 1);
        // 180 vs 150
        assert_eq!(stats.revenue_change, 20);
        assert_eq!(stats.sales_change, 20);
        // 3 vs 2
        assert_eq!(stats.orders_change, 50);
        assert_eq!(stats.customers_change, 0);
    }

    #[tokio::test]
    async fn test_recent_orders_and_low_stock() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let cashier = staff_cookie(&state, "cashier");

        for i in 0..12 {
            insert_order(
                &state.db,
                &format!("ORD-{:02}", i),
                "1.00",
                "paid",
                &format!("2026-01-{:02}T00:00:00Z", i + 1),
            )
            .await;
        }
        let (status, body) = send_json(
            &app,
            Method::GET,
            "/api/admin/dashboard/recent-orders",
            json!(null),
            Some(&cashier),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 10);
        assert_eq!(body[0]["orderNumber"], "ORD-11");

        let plenty = insert_product(&state.db, "P-1", "1.00", 50).await;
        let low = insert_product(&state.db, "P-2", "1.00", 4).await;
        let empty = insert_product(&state.db, "P-3", "1.00", 0).await;
        let hidden = insert_product(&state.db, "P-4", "1.00", 0).await;
        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
            .bind(hidden)
            .execute(&state.db)
            .await
            .unwrap();

        let (_, body) = send_json(
            &app,
            Method::GET,
            "/api/admin/dashboard/low-stock",
            json!(null),
            Some(&cashier),
        )
        .await;
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![empty, low]);
        assert!(!ids.contains(&plenty));
    }
}
