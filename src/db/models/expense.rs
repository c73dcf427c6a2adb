use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: i64,
    pub description: String,
    pub amount: String,
    pub category: String,
    pub date: String,
    pub recorded_by: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    #[serde(default)]
    pub description: String,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub category: String,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; defaults to now
    pub date: Option<String>,
}
