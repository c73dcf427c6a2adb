//! Catalog products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use super::common::{parse_json, parse_string_list};

/// Row in the `products` table. JSON columns are kept as text.
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: String,
    pub compare_price: Option<String>,
    pub cost_price: Option<String>,
    pub images: String,
    pub category: Option<String>,
    pub tags: String,
    pub sizes: String,
    pub colors: String,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub is_active: bool,
    pub is_featured: bool,
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: String,
    pub compare_price: Option<String>,
    pub cost_price: Option<String>,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub is_active: bool,
    pub is_featured: bool,
    pub metadata: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            images: parse_string_list(&p.images),
            tags: parse_string_list(&p.tags),
            sizes: parse_string_list(&p.sizes),
            colors: parse_string_list(&p.colors),
            metadata: parse_json(p.metadata.as_deref()),
            id: p.id,
            sku: p.sku,
            name: p.name,
            slug: p.slug,
            description: p.description,
            price: p.price,
            compare_price: p.compare_price,
            cost_price: p.cost_price,
            category: p.category,
            stock_quantity: p.stock_quantity,
            low_stock_threshold: p.low_stock_threshold,
            is_active: p.is_active,
            is_featured: p.is_featured,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub fn default_sizes() -> Vec<String> {
    ["S", "M", "L", "XL"].iter().map(|s| s.to_string()).collect()
}

fn default_low_stock_threshold() -> i64 {
    10
}

fn default_true() -> bool {
    true
}

/// Money fields accept JSON numbers or decimal strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_sizes")]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    pub metadata: Option<Value>,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub stock_quantity: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub metadata: Option<Value>,
}

/// Query string for the public catalog
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub featured: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LowStockProduct {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
}
