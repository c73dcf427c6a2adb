//! Product catalog: public listing for the shop and staff CRUD.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::session::StaffSession;
use super::validation::{validate_required, validate_slug, validate_stock};
use crate::db::{
    encode_json, encode_string_list, now_timestamp, CreateProductRequest, Product, ProductQuery,
    ProductResponse, StaffRole, UpdateProductRequest,
};
use crate::money::{format_money, require_non_negative};
use crate::AppState;

const MAX_LIMIT: i64 = 200;

/// Make `%`, `_` and `\` match literally under `ESCAPE '\'`
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn fetch_product(state: &AppState, id: i64) -> Result<Option<Product>, ApiError> {
    Ok(sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?)
}

/// GET /api/products
pub async fn list_public(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM products WHERE is_active = 1");

    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        qb.push(" AND category = ").push_bind(category.to_string());
    }

    if query.featured.as_deref() == Some("true") {
        qb.push(" AND is_featured = 1");
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    qb.push(" ORDER BY created_at DESC, id DESC");

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(limit.clamp(0, MAX_LIMIT));
    }

    let products: Vec<Product> = qb.build_query_as().fetch_all(&state.db).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /api/products/:id
pub async fn get_public(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = fetch_product(&state, id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product.into()))
}

/// GET /api/admin/products
pub async fn list(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let products: Vec<Product> =
        sqlx::query_as("SELECT * FROM products ORDER BY created_at DESC, id DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /api/admin/products/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let product = fetch_product(&state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product.into()))
}

/// POST /api/admin/products
pub async fn create(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    session.authorize(StaffRole::can_manage_catalog)?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("sku", validate_required(&req.sku, "SKU"));
    errors.check("name", validate_required(&req.name, "Name"));
    errors.check("slug", validate_slug(&req.slug));
    errors.check("stockQuantity", validate_stock(req.stock_quantity));
    errors.check("lowStockThreshold", validate_stock(req.low_stock_threshold));
    if req.price.is_none() {
        errors.add("price", "Price is required");
    }
    errors.finish()?;

    let price = req
        .price
        .map(|p| require_non_negative(p, "price"))
        .transpose()?
        .unwrap_or_default();
    let compare_price = req
        .compare_price
        .map(|p| require_non_negative(p, "comparePrice"))
        .transpose()?;
    let cost_price = req
        .cost_price
        .map(|p| require_non_negative(p, "costPrice"))
        .transpose()?;

    let now = now_timestamp();
    let result = sqlx::query(
        r#"
        INSERT INTO products (
            sku, name, slug, description, price, compare_price, cost_price,
            images, category, tags, sizes, colors, stock_quantity, low_stock_threshold,
            is_active, is_featured, metadata, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(req.sku.trim())
    .bind(req.name.trim())
    .bind(&req.slug)
    .bind(&req.description)
    .bind(format_money(price))
    .bind(compare_price.map(format_money))
    .bind(cost_price.map(format_money))
    .bind(encode_string_list(&req.images))
    .bind(&req.category)
    .bind(encode_string_list(&req.tags))
    .bind(encode_string_list(&req.sizes))
    .bind(encode_string_list(&req.colors))
    .bind(req.stock_quantity)
    .bind(req.low_stock_threshold)
    .bind(req.is_active)
    .bind(req.is_featured)
    .bind(encode_json(req.metadata.as_ref()))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let id = result.last_insert_rowid();
    tracing::info!(product_id = id, sku = %req.sku, by = %session.claims.id, "Product created");

    let product = fetch_product(&state, id)
        .await?
        .ok_or_else(|| ApiError::internal("Product vanished after insert"))?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /api/admin/products/:id
///
/// Partial update. The inventory screen uses it to set `stockQuantity`.
/// Only the columns present in the request are written, so a concurrent sale's
/// stock decrement survives an unrelated edit.
pub async fn update(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    session.authorize(StaffRole::can_manage_catalog)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(sku) = &req.sku {
        errors.check("sku", validate_required(sku, "SKU"));
    }
    if let Some(name) = &req.name {
        errors.check("name", validate_required(name, "Name"));
    }
    if let Some(slug) = &req.slug {
        errors.check("slug", validate_slug(slug));
    }
    if let Some(stock) = req.stock_quantity {
        errors.check("stockQuantity", validate_stock(stock));
    }
    if let Some(threshold) = req.low_stock_threshold {
        errors.check("lowStockThreshold", validate_stock(threshold));
    }
    errors.finish()?;

    let price = req.price.map(|p| require_non_negative(p, "price")).transpose()?;
    let compare_price = req
        .compare_price
        .map(|p| require_non_negative(p, "comparePrice"))
        .transpose()?;
    let cost_price = req
        .cost_price
        .map(|p| require_non_negative(p, "costPrice"))
        .transpose()?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE products SET ");
    let mut set = qb.separated(", ");
    if let Some(sku) = req.sku {
        set.push("sku = ").push_bind_unseparated(sku.trim().to_string());
    }
    if let Some(name) = req.name {
        set.push("name = ").push_bind_unseparated(name.trim().to_string());
    }
    if let Some(slug) = req.slug {
        set.push("slug = ").push_bind_unseparated(slug);
    }
    if let Some(description) = req.description {
        set.push("description = ").push_bind_unseparated(description);
    }
    if let Some(price) = price {
        set.push("price = ").push_bind_unseparated(format_money(price));
    }
    if let Some(price) = compare_price {
        set.push("compare_price = ").push_bind_unseparated(format_money(price));
    }
    if let Some(price) = cost_price {
        set.push("cost_price = ").push_bind_unseparated(format_money(price));
    }
    if let Some(images) = req.images {
        set.push("images = ").push_bind_unseparated(encode_string_list(&images));
    }
    if let Some(category) = req.category {
        set.push("category = ").push_bind_unseparated(category);
    }
    if let Some(tags) = req.tags {
        set.push("tags = ").push_bind_unseparated(encode_string_list(&tags));
    }
    if let Some(sizes) = req.sizes {
        set.push("sizes = ").push_bind_unseparated(encode_string_list(&sizes));
    }
    if let Some(colors) = req.colors {
        set.push("colors = ").push_bind_unseparated(encode_string_list(&colors));
    }
    if let Some(stock) = req.stock_quantity {
        set.push("stock_quantity = ").push_bind_unseparated(stock);
    }
    if let Some(threshold) = req.low_stock_threshold {
        set.push("low_stock_threshold = ").push_bind_unseparated(threshold);
    }
    if let Some(active) = req.is_active {
        set.push("is_active = ").push_bind_unseparated(active);
    }
    if let Some(featured) = req.is_featured {
        set.push("is_featured = ").push_bind_unseparated(featured);
    }
    if let Some(metadata) = req.metadata {
        set.push("metadata = ").push_bind_unseparated(encode_json(Some(&metadata)));
    }
    set.push("updated_at = ").push_bind_unseparated(now_timestamp());
    qb.push(" WHERE id = ").push_bind(id);

    let result = qb.build().execute(&state.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(product_id = id, by = %session.claims.id, "Product updated");

    let product = fetch_product(&state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product.into()))
}

/// DELETE /api/admin/products/:id
///
/// Soft delete: the row stays so past order items keep their product.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    session.authorize(StaffRole::can_manage_catalog)?;

    let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(now_timestamp())
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(product_id = id, by = %session.claims.id, "Product deactivated");
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use axum::http::Method;

    #[tokio::test]
    async fn test_create_and_fetch() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let manager = staff_cookie(&state, "manager");

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/products",
            json!({
                "sku": "TEE-001",
                "name": "Frost Tee",
                "slug": "frost-tee",
                "price": 24.5,
                "category": "tops",
                "images": ["/img/tee.png"],
                "stockQuantity": 12
            }),
            Some(&manager),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["price"], "24.50");
        assert_eq!(body["sizes"], json!(["S", "M", "L", "XL"]));
        assert_eq!(body["lowStockThreshold"], 10);
        assert_eq!(body["isActive"], true);

        let id = body["id"].as_i64().unwrap();
        let (status, body) =
            send_json(&app, Method::GET, &format!("/api/products/{}", id), json!(null), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images"], json!(["/img/tee.png"]));
    }

    #[tokio::test]
    async fn test_create_validation_and_duplicates() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/products",
            json!({ "sku": "", "name": "X", "slug": "Bad Slug" }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["sku"].is_array());
        assert!(body["details"]["slug"].is_array());
        assert!(body["details"]["price"].is_array());

        insert_product(&state.db, "DUP-1", "10.00", 1).await;
        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/admin/products",
            json!({ "sku": "DUP-1", "name": "Dup", "slug": "dup", "price": "5" }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cashier_cannot_write_catalog() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let cashier = staff_cookie(&state, "cashier");
        let id = insert_product(&state.db, "TEE-2", "10.00", 3).await;

        let (status, _) =
            send_json(&app, Method::GET, "/api/admin/products", json!(null), Some(&cashier)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send_json(
            &app,
            Method::PUT,
            &format!("/api/admin/products/{}", id),
            json!({ "stockQuantity": 50 }),
            Some(&cashier),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(stock_of(&state.db, id).await, 3);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_product(&state.db, "TEE-3", "10.00", 3).await;

        let (status, body) = send_json(
            &app,
            Method::PUT,
            &format!("/api/admin/products/{}", id),
            json!({ "stockQuantity": 40, "isFeatured": true }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stockQuantity"], 40);
        assert_eq!(body["isFeatured"], true);
        assert_eq!(body["price"], "10.00");
        assert_eq!(body["sku"], "TEE-3");

        let (status, _) = send_json(
            &app,
            Method::PUT,
            "/api/admin/products/9999",
            json!({ "stockQuantity": 1 }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_product(&state.db, "TEE-4", "10.00", 3).await;

        let (status, body) = send_json(
            &app,
            Method::DELETE,
            &format!("/api/admin/products/{}", id),
            json!(null),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let row: (i64, bool) = sqlx::query_as("SELECT COUNT(*), MAX(is_active) FROM products WHERE id = ?")
            .bind(id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(row, (1, false));

        // Gone from the shop, still visible to staff
        let (status, _) =
            send_json(&app, Method::GET, &format!("/api/products/{}", id), json!(null), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = send_json(
            &app,
            Method::GET,
            &format!("/api/admin/products/{}", id),
            json!(null),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isActive"], false);
    }

    #[tokio::test]
    async fn test_public_filters() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let a = insert_product(&state.db, "A-1", "10.00", 3).await;
        let b = insert_product(&state.db, "B-1", "12.00", 3).await;
        let c = insert_product(&state.db, "C-1", "15.00", 3).await;
        sqlx::query("UPDATE products SET category = 'tops', is_featured = 1, description = 'warm winter knit' WHERE id = ?")
            .bind(a)
            .execute(&state.db)
            .await
            .unwrap();
        sqlx::query("UPDATE products SET category = 'tops' WHERE id = ?")
            .bind(b)
            .execute(&state.db)
            .await
            .unwrap();
        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
            .bind(c)
            .execute(&state.db)
            .await
            .unwrap();

        let (_, body) = send_json(&app, Method::GET, "/api/products", json!(null), None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) =
            send_json(&app, Method::GET, "/api/products?category=tops&featured=true", json!(null), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], a);

        let (_, body) = send_json(&app, Method::GET, "/api/products?search=winter", json!(null), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send_json(&app, Method::GET, "/api/products?limit=1", json!(null), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_wildcards_match_literally() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let cotton = insert_product(&state.db, "COT-1", "10.00", 3).await;
        let wool = insert_product(&state.db, "WOL-1", "10.00", 3).await;
        for (id, name) in [(cotton, "100% Cotton Tee"), (wool, "1000 Thread Wool")] {
            sqlx::query("UPDATE products SET name = ? WHERE id = ?")
                .bind(name)
                .bind(id)
                .execute(&state.db)
                .await
                .unwrap();
        }

        let (_, body) = send_json(&app, Method::GET, "/api/products?search=100%25", json!(null), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], cotton);

        let (_, body) = send_json(&app, Method::GET, "/api/products?search=_", json!(null), None).await;
        assert!(body.as_array().unwrap().is_empty());

        let (_, body) = send_json(&app, Method::GET, "/api/products?search=100", json!(null), None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_price_rejected() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");
        let id = insert_product(&state.db, "BIG-1", "10.00", 3).await;

        let (status, body) = send_json(
            &app,
            Method::PUT,
            &format!("/api/admin/products/{}", id),
            json!({ "price": "79228162514264337593543950335" }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["price"].is_array());

        let (_, body) =
            send_json(&app, Method::GET, &format!("/api/products/{}", id), json!(null), None).await;
        assert_eq!(body["price"], "10.00");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_edit_does_not_undo_concurrent_sale() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");

        for round in 0..20 {
            let id = insert_product(&state.db, &format!("RACE-{}", round), "10.00", 100).await;
            let uri = format!("/api/admin/products/{}", id);
            let rename = send_json(
                &app,
                Method::PUT,
                &uri,
                json!({ "name": format!("Renamed {}", round) }),
                Some(&admin),
            );
            let sale = send_json(
                &app,
                Method::POST,
                "/api/admin/orders",
                json!({ "items": [{ "productId": id, "quantity": 5 }] }),
                Some(&admin),
            );
            let ((rename_status, renamed), (sale_status, _)) = tokio::join!(rename, sale);
            assert_eq!(rename_status, StatusCode::OK);
            assert_eq!(sale_status, StatusCode::CREATED);
            assert_eq!(renamed["name"], format!("Renamed {}", round));
            assert_eq!(stock_of(&state.db, id).await, 95, "round {}", round);
        }
    }
}
