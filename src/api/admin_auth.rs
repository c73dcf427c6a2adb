//! Staff realm authentication against the `admin_users` table.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;

use super::auth::{normalize_email, session_response, verify_password};
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::record_auth_attempt;
use super::session::{removal_cookie, session_cookie, Realm, SessionSubject, StaffSession};
use super::validation::{validate_email, validate_password};
use crate::db::{
    now_timestamp, seed_staff_user, SeedOutcome, SeedStaffRequest, SigninRequest, StaffRole,
    StaffUser, StaffUserResponse,
};
use crate::AppState;

/// POST /api/admin/auth/signin
pub async fn signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let invalid = || ApiError::unauthorized("Invalid email or password");
    let email = normalize_email(&req.email);

    let user: Option<StaffUser> = sqlx::query_as("SELECT * FROM admin_users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let (user, hash) = match user {
        Some(u) => match u.password_hash.clone() {
            Some(hash) => (u, hash),
            None => {
                record_auth_attempt("admin", "invalid");
                return Err(invalid());
            }
        },
        None => {
            tracing::warn!(email = %email, "Staff sign-in for unknown email");
            record_auth_attempt("admin", "invalid");
            return Err(invalid());
        }
    };

    let role = match user.role_enum() {
        Some(role) => role,
        None => {
            record_auth_attempt("admin", "forbidden");
            return Err(ApiError::forbidden("Access denied. Admin credentials required."));
        }
    };

    if !verify_password(&req.password, &hash) {
        tracing::warn!(email = %email, "Invalid staff password");
        record_auth_attempt("admin", "invalid");
        return Err(invalid());
    }

    if !user.is_active {
        tracing::warn!(email = %email, "Disabled staff account attempted sign-in");
        record_auth_attempt("admin", "forbidden");
        return Err(ApiError::forbidden("This account has been disabled"));
    }

    let now = now_timestamp();
    sqlx::query(
        "UPDATE admin_users SET last_login = ?, email_verified = COALESCE(email_verified, ?), updated_at = ? WHERE id = ?",
    )
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    let subject = SessionSubject {
        id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        picture: user.image.clone(),
        role: role.to_string(),
    };
    let token = state.sessions.issue(Realm::Staff, &subject).map_err(|e| {
        tracing::error!("{}", e);
        ApiError::internal("Authentication failed")
    })?;

    record_auth_attempt("admin", "success");
    tracing::info!(user_id = %user.id, role = %role, "Staff signed in");

    let jar = jar.add(session_cookie(
        Realm::Staff,
        token,
        state.config.auth.secure_cookies,
        state.sessions.max_age_secs(),
    ));
    Ok((jar, Json(json!({ "ok": true }))))
}

/// POST /api/admin/auth/signout
pub async fn signout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(removal_cookie(Realm::Staff, state.config.auth.secure_cookies));
    (jar, Json(json!({ "ok": true })))
}

/// GET /api/admin/auth/session
pub async fn session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<serde_json::Value> {
    let session = session_response(&headers, &state, Realm::Staff);
    if session.user.is_none() {
        return Json(json!({ "session": null }));
    }
    Json(json!({ "session": session }))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// POST /api/admin/seed
///
/// Open while no staff account exists; afterwards admin only.
pub async fn seed(
    State(state): State<Arc<AppState>>,
    session: Result<StaffSession, ApiError>,
    Json(req): Json<SeedStaffRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match session {
        Ok(session) => session.authorize(StaffRole::can_manage_staff)?,
        Err(e) if e.status() == StatusCode::FORBIDDEN => return Err(e),
        Err(e) => {
            let staff_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_users")
                .fetch_one(&state.db)
                .await?;
            if staff_count > 0 {
                return Err(e);
            }
            tracing::info!("No staff accounts yet, allowing bootstrap seed");
        }
    }

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let role: StaffRole = req
        .role
        .as_deref()
        .unwrap_or("admin")
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid role. Must be one of: admin, manager, cashier"))?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&req.email));
    errors.check("password", validate_password(&req.password));
    errors.finish()?;

    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} User", capitalize(role.as_str())));

    let outcome = seed_staff_user(&state.db, &req.email, &req.password, &name, role)
        .await
        .map_err(|e| {
            tracing::error!("Failed to seed staff user: {:#}", e);
            ApiError::internal("Failed to create admin user")
        })?;

    match outcome {
        SeedOutcome::Created(user) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": format!("{} user created successfully", capitalize(role.as_str())),
                "user": StaffUserResponse::from(user),
            })),
        )),
        SeedOutcome::AlreadyExists(_) => {
            Err(ApiError::bad_request("User with this email already exists"))
        }
    }
}
