//! Google sign-in for shop customers.
//!
//! The authorization code flow lands in the same `users` table as password
//! sign-in. An `accounts` row links the Google subject to the user.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::ApiError;
use super::metrics::record_auth_attempt;
use super::session::{session_cookie, Realm, SessionSubject};
use crate::config::GoogleOAuthConfig;
use crate::db::{now_timestamp, User};
use crate::AppState;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const PROVIDER: &str = "google";
const STATE_COOKIE: &str = "oauth_state";

/// URL-encode a string for use in query parameters
fn url_encode(s: &str) -> String {
    let mut encoded = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

fn google_config(state: &AppState) -> Result<&GoogleOAuthConfig, ApiError> {
    state
        .config
        .auth
        .google
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Google sign-in is not configured"))
}

pub fn authorization_url(config: &GoogleOAuthConfig, csrf_state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
        GOOGLE_AUTH_URL,
        url_encode(&config.client_id),
        url_encode(&config.redirect_uri),
        url_encode("openid email profile"),
        url_encode(csrf_state),
    )
}

/// GET /api/auth/google
pub async fn google_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let config = google_config(&state)?;
    let csrf_state = uuid::Uuid::new_v4().simple().to_string();

    let cookie = Cookie::build((STATE_COOKIE, csrf_state.clone()))
        .path("/api/auth/google")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.auth.secure_cookies)
        .max_age(time::Duration::minutes(10))
        .build();

    Ok((jar.add(cookie), Redirect::to(&authorization_url(config, &csrf_state))))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Subset of the OpenID Connect userinfo document
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

fn login_error(kind: &str) -> Response {
    Redirect::to(&format!("{}?error={}", Realm::Customer.login_path(), kind)).into_response()
}

/// GET /api/auth/google/callback
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let config = google_config(&state)?;

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/api/auth/google"));

    if let Some(error) = query.error {
        tracing::warn!("Google sign-in cancelled: {}", error);
        return Ok((jar, login_error("AccessDenied")).into_response());
    }

    let state_ok = match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(got)) => bool::from(expected.as_bytes().ct_eq(got.as_bytes())),
        _ => false,
    };
    if !state_ok {
        tracing::warn!("Google callback with missing or mismatched state");
        record_auth_attempt("shop", "invalid");
        return Ok((jar, login_error("OAuthState")).into_response());
    }

    let code = match query.code {
        Some(code) if !code.is_empty() => code,
        _ => return Ok((jar, login_error("OAuthCallback")).into_response()),
    };

    let profile = match fetch_profile(config, &code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!("Google sign-in failed: {}", e);
            return Ok((jar, login_error("OAuthCallback")).into_response());
        }
    };

    if !profile.email_verified {
        record_auth_attempt("shop", "unverified");
        return Ok((jar, login_error("EmailNotVerified")).into_response());
    }

    let user = link_or_create_user(&state.db, &profile).await?;

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
    tracing::info!(user_id = %user.id, "Customer signed in with Google");

    let jar = jar.add(session_cookie(
        Realm::Customer,
        token,
        state.config.auth.secure_cookies,
        state.sessions.max_age_secs(),
    ));
    Ok((jar, Redirect::to("/")).into_response())
}

async fn fetch_profile(config: &GoogleOAuthConfig, code: &str) -> anyhow::Result<GoogleProfile> {
    let client = reqwest::Client::new();

    let token: TokenResponse = client
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", config.redirect_uri.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let profile = client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(profile)
}

/// Find the user linked to this Google identity, linking by email or creating one if needed
pub async fn link_or_create_user(pool: &SqlitePool, profile: &GoogleProfile) -> Result<User, ApiError> {
    let linked: Option<User> = sqlx::query_as(
        r#"
        SELECT u.* FROM users u
        JOIN accounts a ON a.user_id = u.id
        WHERE a.provider = ? AND a.provider_account_id = ?
        "#,
    )
    .bind(PROVIDER)
    .bind(&profile.sub)
    .fetch_optional(pool)
    .await?;

    if let Some(user) = linked {
        return Ok(user);
    }

    let email = profile.email.trim().to_lowercase();
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&mut *tx)
        .await?;

    let user_id = match existing {
        Some(user) => {
            // Google vouched for the address
            sqlx::query(
                "UPDATE users SET email_verified = COALESCE(email_verified, ?), image = COALESCE(image, ?), updated_at = ? WHERE id = ?",
            )
            .bind(&now)
            .bind(&profile.picture)
            .bind(&now)
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;
            user.id
        }
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO users (id, name, email, email_verified, role, image, created_at, updated_at)
                VALUES (?, ?, ?, ?, 'customer', ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&profile.name)
            .bind(&email)
            .bind(&now)
            .bind(&profile.picture)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            tracing::info!(user_id = %id, email = %email, "Customer created from Google profile");
            id
        }
    };

    sqlx::query(
        "INSERT INTO accounts (user_id, provider, provider_account_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(PROVIDER)
    .bind(&profile.sub)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_one(pool)
        .await?;
    Ok(user)
}
