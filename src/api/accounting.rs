//! Profit and loss summary over orders and expenses.

use axum::{extract::State, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::ApiError;
use super::session::StaffSession;
use crate::db::StaffRole;
use crate::money::{format_money, parse_money, MoneyError};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: String,
    pub sales: String,
    pub expenses: String,
    pub profit: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingSummary {
    pub total_sales: String,
    pub total_expenses: String,
    pub net_profit: String,
    pub monthly: Vec<MonthSummary>,
}

#[derive(Default)]
struct Bucket {
    sales: Decimal,
    expenses: Decimal,
}

/// "2026-01-15T..." becomes ("2026-01", "Jan 2026")
fn month_of(timestamp: &str) -> Option<(String, String)> {
    let key = timestamp.get(..7)?;
    let first = NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").ok()?;
    Some((key.to_string(), first.format("%b %Y").to_string()))
}

fn add(acc: &mut Decimal, amount: Decimal) -> Result<(), MoneyError> {
    *acc = acc.checked_add(amount).ok_or(MoneyError::Overflow)?;
    Ok(())
}

fn net(income: Decimal, outgoing: Decimal) -> Result<String, MoneyError> {
    income
        .checked_sub(outgoing)
        .map(format_money)
        .ok_or(MoneyError::Overflow)
}

/// Fold dated amounts into totals and a chronological per-month breakdown
fn summarize(sales: &[(String, String)], expenses: &[(String, String)]) -> Result<AccountingSummary, ApiError> {
    let mut months: BTreeMap<String, (String, Bucket)> = BTreeMap::new();
    let mut total_sales = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;

    for (amount, at) in sales {
        let amount = parse_money(amount)?;
        add(&mut total_sales, amount)?;
        if let Some((key, label)) = month_of(at) {
            let bucket = &mut months.entry(key).or_insert_with(|| (label, Bucket::default())).1;
            add(&mut bucket.sales, amount)?;
        }
    }
    for (amount, at) in expenses {
        let amount = parse_money(amount)?;
        add(&mut total_expenses, amount)?;
        if let Some((key, label)) = month_of(at) {
            let bucket = &mut months.entry(key).or_insert_with(|| (label, Bucket::default())).1;
            add(&mut bucket.expenses, amount)?;
        }
    }

    let monthly = months
        .into_values()
        .map(|(label, b)| {
            Ok(MonthSummary {
                month: label,
                sales: format_money(b.sales),
                expenses: format_money(b.expenses),
                profit: net(b.sales, b.expenses)?,
            })
        })
        .collect::<Result<Vec<_>, MoneyError>>()?;

    Ok(AccountingSummary {
        total_sales: format_money(total_sales),
        total_expenses: format_money(total_expenses),
        net_profit: net(total_sales, total_expenses)?,
        monthly,
    })
}

/// GET /api/admin/accounting/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<AccountingSummary>, ApiError> {
    session.authorize(StaffRole::can_view_accounting)?;

    let sales: Vec<(String, String)> = sqlx::query_as(
        "SELECT total, created_at FROM orders WHERE status != 'cancelled' AND payment_status != 'refunded'",
    )
    .fetch_all(&state.db)
    .await?;
    let expenses: Vec<(String, String)> = sqlx::query_as("SELECT amount, date FROM expenses")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(summarize(&sales, &expenses)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    fn rows(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn test_month_of() {
        assert_eq!(
            month_of("2026-01-15T10:00:00Z"),
            Some(("2026-01".to_string(), "Jan 2026".to_string()))
        );
        assert_eq!(month_of("bad"), None);
    }

    #[test]
    fn test_summarize_orders_months_chronologically() {
        let sales = rows(&[
            ("100.00", "2026-02-03T00:00:00Z"),
            ("40.50", "2025-12-24T00:00:00Z"),
            ("9.50", "2026-02-20T00:00:00Z"),
        ]);
        let expenses = rows(&[("30.00", "2026-01-05T00:00:00Z"), ("10.00", "2026-02-01T00:00:00Z")]);

        let s = summarize(&sales, &expenses).unwrap();
        assert_eq!(s.total_sales, "150.00");
        assert_eq!(s.total_expenses, "40.00");
        assert_eq!(s.net_profit, "110.00");

        let labels: Vec<&str> = s.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, vec!["Dec 2025", "Jan 2026", "Feb 2026"]);
        assert_eq!(s.monthly[1].profit, "-30.00");
        assert_eq!(s.monthly[2].sales, "109.50");
    }

    #[test]
    fn test_summarize_overflow_is_an_error() {
        let max = "79228162514264337593543950335";
        let sales = rows(&[(max, "2026-01-01T00:00:00Z"), (max, "2026-01-02T00:00:00Z")]);
        let err = summarize(&sales, &[]).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_summary_excludes_cancelled_and_refunded() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let manager = staff_cookie(&state, "manager");

        for (number, total, status, payment) in [
            ("ORD-1", "80.00", "delivered", "paid"),
            ("ORD-2", "500.00", "cancelled", "paid"),
            ("ORD-3", "300.00", "delivered", "refunded"),
        ] {
            sqlx::query(
                "INSERT INTO orders (order_number, subtotal, total, status, payment_status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, '2026-01-10T00:00:00Z', '2026-01-10T00:00:00Z')",
            )
            .bind(number)
            .bind(total)
            .bind(total)
            .bind(status)
            .bind(payment)
            .execute(&state.db)
            .await
            .unwrap();
        }

        let (status, body) = send_json(
            &app,
            Method::GET,
            "/api/admin/accounting/summary",
            json!(null),
            Some(&manager),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalSales"], "80.00");
        assert_eq!(body["monthly"][0]["month"], "Jan 2026");

        let cashier = staff_cookie(&state, "cashier");
        let (status, _) = send_json(
            &app,
            Method::GET,
            "/api/admin/accounting/summary",
            json!(null),
            Some(&cashier),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
