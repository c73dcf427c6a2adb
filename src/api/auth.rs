//! Shop customer authentication: registration by emailed code, password
//! sign-in and the customer session cookie.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::record_auth_attempt;
use super::session::{read_session, removal_cookie, session_cookie, Claims, Realm, SessionSubject};
use super::validation::{validate_email, validate_name, validate_password, validate_verification_code};
use crate::db::{
    format_timestamp, now_timestamp, RegisterRequest, SendCodeRequest, SigninRequest, User,
    UserRole,
};
use crate::AppState;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hash a verification code for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Six-digit numeric code
pub fn generate_verification_code() -> String {
    rand::rng().random_range(100_000..1_000_000).to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Replace any outstanding codes for `email` with `code`
pub async fn store_verification_code(
    pool: &SqlitePool,
    email: &str,
    code: &str,
    ttl_minutes: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let expires_at = format_timestamp(now + Duration::minutes(ttl_minutes));

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM verification_tokens WHERE identifier = ?")
        .bind(email)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO verification_tokens (identifier, token_hash, expires_at) VALUES (?, ?, ?)")
        .bind(email)
        .bind(hash_token(code))
        .bind(&expires_at)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(())
}

/// Check a code and consume it. Codes are single use and expire.
///
/// The check and the consumption are one statement, so of two concurrent
/// attempts with the same code only one succeeds.
pub async fn verify_code(
    pool: &SqlitePool,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM verification_tokens WHERE identifier = ? AND token_hash = ? AND expires_at > ?",
    )
    .bind(email)
    .bind(hash_token(code.trim()))
    .bind(format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// POST /api/auth/send-verification-code
pub async fn send_verification_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendCodeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_email(&req.email).map_err(ApiError::bad_request)?;
    let email = normalize_email(&req.email);

    if find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::bad_request("User with this email already exists"));
    }

    let ttl = state.config.auth.verification_code_ttl_minutes;
    let code = generate_verification_code();
    store_verification_code(&state.db, &email, &code, ttl, Utc::now()).await?;

    if let Err(e) = state.mailer.send_verification_code(&email, &code, ttl).await {
        tracing::error!(email = %email, "Failed to send verification email: {}", e);
        return Err(ApiError::external("Failed to send verification code"));
    }

    tracing::info!(email = %email, "Verification code issued");

    let mut body = json!({ "message": "Verification code sent to your email" });
    if state.config.auth.expose_verification_code {
        body["code"] = json!(code);
    }
    Ok(Json(body))
}

/// POST /api/auth/verify-and-register
pub async fn verify_and_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_name(&req.name));
    errors.check("email", validate_email(&req.email));
    errors.check("password", validate_password(&req.password));
    errors.finish()?;

    let code = req
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Verification code is required"))?;
    validate_verification_code(code).map_err(|e| ApiError::validation_field("code", e))?;

    let email = normalize_email(&req.email);

    if !verify_code(&state.db, &email, code, Utc::now()).await? {
        tracing::warn!(email = %email, "Rejected verification code");
        return Err(ApiError::bad_request("Invalid or expired verification code"));
    }

    if find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::bad_request("User with this email already exists"));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create account")
    })?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let name = req.name.trim().to_string();
    let phone = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, email_verified, password_hash, role, phone, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'customer', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&name)
    .bind(&email)
    .bind(&now)
    .bind(&password_hash)
    .bind(phone)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        err if err.status() == StatusCode::CONFLICT => {
            ApiError::bad_request("User with this email already exists")
        }
        err => err,
    })?;

    tracing::info!(user_id = %id, email = %email, "Customer registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Account created successfully",
            "user": { "id": id, "email": email, "name": name },
        })),
    ))
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
    pub expires: Option<String>,
}

impl SessionResponse {
    pub fn anonymous() -> Self {
        Self {
            user: None,
            expires: None,
        }
    }
}

/// POST /api/auth/signin
pub async fn signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid email or password");

    if req.email.trim().is_empty() || req.password.is_empty() {
        record_auth_attempt("shop", "invalid");
        return Err(invalid());
    }

    let email = normalize_email(&req.email);
    let user = find_user_by_email(&state.db, &email).await?;

    let user = match user {
        Some(u) => u,
        None => {
            tracing::warn!(email = %email, "Sign-in for unknown email");
            record_auth_attempt("shop", "invalid");
            return Err(invalid());
        }
    };

    let password_ok = user
        .password_hash
        .as_deref()
        .map(|hash| verify_password(&req.password, hash))
        .unwrap_or(false);
    if !password_ok {
        tracing::warn!(email = %email, "Invalid password");
        record_auth_attempt("shop", "invalid");
        return Err(invalid());
    }

    let role = user.role_enum();
    if !role.is_admin_class() && !user.is_verified() {
        record_auth_attempt("shop", "unverified");
        return Err(ApiError::forbidden(
            "Email not verified. Please verify your email first.",
        ));
    }

    // Staff-class rows in the customer table are trusted on first login
    if role.is_admin_class() && !user.is_verified() {
        let now = now_timestamp();
        sqlx::query("UPDATE users SET email_verified = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(&user.id)
            .execute(&state.db)
            .await?;
    }

    let subject = SessionSubject {
        id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        picture: user.image.clone(),
        role: user.role.clone(),
    };
    let token = state.sessions.issue(Realm::Customer, &subject).map_err(|e| {
        tracing::error!("{}", e);
        ApiError::internal("Failed to create session")
    })?;

    record_auth_attempt("shop", "success");
    tracing::info!(user_id = %user.id, role = %role, "Customer signed in");

    let secure = state.config.auth.secure_cookies;
    let jar = jar.add(session_cookie(
        Realm::Customer,
        token,
        secure,
        state.sessions.max_age_secs(),
    ));

    Ok((
        jar,
        Json(json!({
            "user": SessionUser {
                id: user.id,
                email: user.email,
                name: user.name,
                image: user.image,
                role: user.role,
            }
        })),
    ))
}

/// POST /api/auth/signout
pub async fn signout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let secure = state.config.auth.secure_cookies;
    let jar = jar.add(removal_cookie(Realm::Customer, secure));
    (jar, Json(json!({ "message": "Signed out" })))
}

/// GET /api/auth/session
pub async fn session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<SessionResponse> {
    Json(session_response(&headers, &state, Realm::Customer))
}

/// Session summary for either realm's `/session` endpoint
pub fn session_response(headers: &HeaderMap, state: &AppState, realm: Realm) -> SessionResponse {
    match read_session(headers, state, realm) {
        Some(claims) => SessionResponse {
            expires: DateTime::<Utc>::from_timestamp(claims.exp, 0).map(format_timestamp),
            user: Some(SessionUser {
                id: claims.id,
                email: claims.email,
                name: claims.name,
                image: claims.picture,
                role: claims.role,
            }),
        },
        None => SessionResponse::anonymous(),
    }
}

/// Roles the customer realm treats as staff
pub fn is_staff_role(role: &str) -> bool {
    role.parse::<UserRole>()
        .map(|r| r.is_admin_class())
        .unwrap_or(false)
}

/// Staff-class accounts use the admin panel, not the shop's cart or profile
pub(crate) fn require_shopper(claims: &Claims) -> Result<(), ApiError> {
    if is_staff_role(&claims.role) {
        return Err(ApiError::forbidden("Staff accounts must use the admin panel"));
    }
    Ok(())
}
