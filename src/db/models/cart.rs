use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cart line joined with the product it points at
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub added_at: String,
    pub product_name: String,
    pub product_slug: String,
    pub price: String,
    pub stock_quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
}
