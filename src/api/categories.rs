use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::session::StaffSession;
use super::validation::{validate_required, validate_slug};
use crate::db::{now_timestamp, Category, CreateCategoryRequest, StaffRole};
use crate::AppState;

/// GET /api/admin/categories
pub async fn list(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Vec<Category>>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(categories))
}

/// POST /api/admin/categories
pub async fn create(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    session.authorize(StaffRole::can_manage_catalog)?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_required(&req.name, "Name"));
    errors.check("slug", validate_slug(&req.slug));
    errors.finish()?;

    let result = sqlx::query(
        r#"
        INSERT INTO categories (name, slug, description, image, parent_id, featured, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.slug)
    .bind(&req.description)
    .bind(&req.image)
    .bind(req.parent_id)
    .bind(req.featured)
    .bind(now_timestamp())
    .execute(&state.db)
    .await?;

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    tracing::info!(category_id = category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}
