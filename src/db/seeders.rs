//! Staff account seeding
//!
//! Used by the `seed-staff` CLI commands and the bootstrap endpoint.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use super::{now_timestamp, StaffRole, StaffUser};
use crate::api::auth::hash_password;

/// Development accounts created by `seed-all-staff`
/// Format: (email, password, name, role)
pub const DEFAULT_STAFF: [(&str, &str, &str, StaffRole); 3] = [
    ("admin@defrost.com", "admin123", "Admin User", StaffRole::Admin),
    ("manager@defrost.com", "manager123", "Store Manager", StaffRole::Manager),
    ("cashier@defrost.com", "cashier123", "Cashier", StaffRole::Cashier),
];

#[derive(Debug)]
pub enum SeedOutcome {
    Created(StaffUser),
    AlreadyExists(StaffUser),
}

/// Create a staff account unless one with this email already exists
pub async fn seed_staff_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    name: &str,
    role: StaffRole,
) -> Result<SeedOutcome> {
    let email = email.trim().to_lowercase();

    let existing: Option<StaffUser> = sqlx::query_as("SELECT * FROM admin_users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if let Some(user) = existing {
        return Ok(SeedOutcome::AlreadyExists(user));
    }

    let password_hash = hash_password(password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO admin_users (id, name, email, email_verified, password_hash, role, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(name)
    .bind(&email)
    .bind(&now)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to insert staff user {}", email))?;

    let user: StaffUser = sqlx::query_as("SELECT * FROM admin_users WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;

    info!(email = %user.email, role = %role, "Seeded staff user");
    Ok(SeedOutcome::Created(user))
}
