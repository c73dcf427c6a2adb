//! Signed session tokens for the shop and staff realms.
//!
//! Both realms share one HMAC secret. The `aud` claim binds a token to its
//! realm, so a customer token copied into the staff cookie fails to verify.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::error::ApiError;
use crate::db::StaffRole;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realm {
    /// Shop customers
    Customer,
    /// Admin, manager and cashier accounts
    Staff,
}

impl Realm {
    pub fn audience(&self) -> &'static str {
        match self {
            Realm::Customer => "shop",
            Realm::Staff => "admin",
        }
    }

    /// Cookie carrying this realm's token. Secure deployments use the `__Secure-` prefix.
    pub fn cookie_name(&self, secure: bool) -> &'static str {
        match (self, secure) {
            (Realm::Customer, false) => "auth.session-token",
            (Realm::Customer, true) => "__Secure-auth.session-token",
            (Realm::Staff, false) => "admin-auth.session-token",
            (Realm::Staff, true) => "__Secure-admin-auth.session-token",
        }
    }

    pub fn login_path(&self) -> &'static str {
        match self {
            Realm::Customer => "/login",
            Realm::Staff => "/admin/login",
        }
    }
}

/// Token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub role: String,
    pub id: String,
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
}

/// Who a session is being issued for
#[derive(Debug, Clone)]
pub struct SessionSubject {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub role: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("failed to sign session token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// The single minting and verification path for both realms
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_age_secs: i64,
}

impl SessionKeys {
    pub fn new(secret: &str, max_age_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            max_age_secs: max_age_days * 24 * 60 * 60,
        }
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    pub fn issue(&self, realm: Realm, subject: &SessionSubject) -> Result<String, SessionError> {
        self.issue_at(realm, subject, Utc::now().timestamp())
    }

    fn issue_at(&self, realm: Realm, subject: &SessionSubject, now: i64) -> Result<String, SessionError> {
        let claims = Claims {
            sub: subject.id.clone(),
            email: subject.email.clone(),
            name: subject.name.clone(),
            picture: subject.picture.clone(),
            role: subject.role.clone(),
            id: subject.id.clone(),
            iat: now,
            exp: now + self.max_age_secs,
            aud: realm.audience().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(SessionError::Signing)
    }

    pub fn verify(&self, realm: Realm, token: &str) -> Result<Claims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[realm.audience()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);
        validation.leeway = 0;

        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

/// Session cookie for a freshly issued token
pub fn session_cookie(realm: Realm, token: String, secure: bool, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((realm.cookie_name(secure), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Expired cookie that clears the realm's session
pub fn removal_cookie(realm: Realm, secure: bool) -> Cookie<'static> {
    Cookie::build((realm.cookie_name(secure), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Find the realm's token in its cookie (either name variant) or a Bearer header
pub fn session_token(headers: &HeaderMap, realm: Realm) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    for secure in [true, false] {
        if let Some(cookie) = jar.get(realm.cookie_name(secure)) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_string());
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Verified claims for the realm, if the request carries a valid session
pub fn read_session(headers: &HeaderMap, state: &AppState, realm: Realm) -> Option<Claims> {
    let token = session_token(headers, realm)?;
    match state.sessions.verify(realm, &token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(realm = realm.audience(), "Ignoring session token: {}", e);
            None
        }
    }
}

/// Authenticated shop customer
#[derive(Debug, Clone)]
pub struct CustomerSession(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CustomerSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        read_session(&parts.headers, state, Realm::Customer)
            .map(CustomerSession)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}

/// Authenticated staff member with an admin-class role
#[derive(Debug, Clone)]
pub struct StaffSession {
    pub claims: Claims,
    pub role: StaffRole,
}

impl StaffSession {
    /// Fail with 403 unless the role passes `allowed`
    pub fn authorize(&self, allowed: fn(&StaffRole) -> bool) -> Result<(), ApiError> {
        if allowed(&self.role) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.claims.id,
                role = %self.role,
                "Staff member lacks permission"
            );
            Err(ApiError::forbidden(
                "Access denied. Insufficient permissions for this action.",
            ))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StaffSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = read_session(&parts.headers, state, Realm::Staff)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized. Please login to continue."))?;

        let role = claims.role.parse::<StaffRole>().map_err(|_| {
            tracing::warn!(user_id = %claims.id, role = %claims.role, "Non-staff role in staff session");
            ApiError::forbidden("Access denied. Admin credentials required.")
        })?;

        Ok(StaffSession { claims, role })
    }
}
