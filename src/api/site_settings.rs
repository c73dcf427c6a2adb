use axum::{extract::State, Json};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::session::StaffSession;
use crate::db::{now_timestamp, SiteSetting, StaffRole, UpsertSettingRequest};
use crate::AppState;

/// GET /api/admin/site-settings
pub async fn list(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> Result<Json<Map<String, Value>>, ApiError> {
    session.authorize(StaffRole::can_view)?;

    let settings = sqlx::query_as::<_, SiteSetting>("SELECT * FROM site_settings ORDER BY key")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(
        settings
            .iter()
            .map(|s| (s.key.clone(), s.parsed_value()))
            .collect(),
    ))
}

/// POST /api/admin/site-settings
pub async fn upsert(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(req): Json<UpsertSettingRequest>,
) -> Result<Json<Value>, ApiError> {
    session.authorize(StaffRole::can_edit_site)?;

    let value = match req.value {
        Some(value) if !req.key.trim().is_empty() => value,
        _ => return Err(ApiError::bad_request("Missing key or value")),
    };

    let now = now_timestamp();
    sqlx::query(
        r#"
        INSERT INTO site_settings (key, value, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(req.key.trim())
    .bind(value.to_string())
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(key = %req.key, by = %session.claims.id, "Site setting saved");
    Ok(Json(json!({ "key": req.key.trim(), "value": value, "updatedAt": now })))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_and_read_back() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/admin/site-settings",
            json!({ "key": "hero", "value": { "title": "Winter drop" } }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/site-settings",
            json!({ "key": "hero", "value": { "title": "Spring drop" } }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"]["title"], "Spring drop");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/admin/site-settings",
            json!({ "key": "banner", "value": null }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) =
            send_json(&app, Method::GET, "/api/admin/site-settings", json!(null), Some(&admin)).await;
        assert_eq!(body, json!({ "banner": null, "hero": { "title": "Spring drop" } }));
    }

    #[tokio::test]
    async fn test_missing_value_rejected() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let admin = staff_cookie(&state, "admin");

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/admin/site-settings",
            json!({ "key": "hero" }),
            Some(&admin),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing key or value");
    }

    #[tokio::test]
    async fn test_only_admin_edits_site() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let manager = staff_cookie(&state, "manager");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/admin/site-settings",
            json!({ "key": "hero", "value": 1 }),
            Some(&manager),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            send_json(&app, Method::GET, "/api/admin/site-settings", json!(null), Some(&manager)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
