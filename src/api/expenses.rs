use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use super::error::ApiError;
use super::session::StaffSession;
use super::validation::validate_date;
use crate::db::{format_timestamp, now_timestamp, CreateExpenseRequest, Expense, StaffRole};
use crate::money::{format_money, require_non_negative};
use crate::AppState;

/// Normalize an accepted date into the stored timestamp form.
/// Bare dates mean midnight UTC.
fn normalize_date(date: &str) -> Option<String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(date) {
        return Some(format_timestamp(at.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| format_timestamp(dt.and_utc()))
}

/// GET /api/admin/expenses
pub async fn list(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<Expense>>, ApiError> {
    session.authorize(StaffRole::can_manage_expenses)?;

    let expenses = sqlx::query_as::<_, Expense>("SELECT * FROM expenses ORDER BY date DESC, id DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(expenses))
}

/// POST /api/admin/expenses
pub async fn create(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    session.authorize(StaffRole::can_manage_expenses)?;

    let amount = match req.amount {
        Some(amount) if !amount.is_zero() => amount,
        _ => return Err(ApiError::bad_request("Missing required fields")),
    };
    if req.description.trim().is_empty() || req.category.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }
    let amount = require_non_negative(amount, "amount")?;

    let date = match req.date.as_deref().filter(|d| !d.is_empty()) {
        Some(date) => {
            validate_date(date).map_err(|e| ApiError::validation_field("date", e))?;
            normalize_date(date).ok_or_else(|| ApiError::validation_field("date", "Invalid date"))?
        }
        None => now_timestamp(),
    };

    let result = sqlx::query(
        "INSERT INTO expenses (description, amount, category, date, recorded_by, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(req.description.trim())
    .bind(format_money(amount))
    .bind(req.category.trim())
    .bind(&date)
    .bind(&session.claims.id)
    .bind(now_timestamp())
    .execute(&state.db)
    .await?;

    let expense = sqlx::query_as::<_, Expense>("SELECT * FROM expenses WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    tracing::info!(expense_id = expense.id, amount = %expense.amount, "Expense recorded");
    Ok((StatusCode::CREATED, Json(expense)))
}
