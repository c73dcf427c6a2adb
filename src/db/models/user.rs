//! Shop customer accounts and their OAuth links.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use super::common::parse_json;

/// Roles a row in the customer table may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Admin,
    Manager,
    Cashier,
    Staff,
}

impl UserRole {
    /// Staff-class roles belong in the admin panel, not the shop profile
    pub fn is_admin_class(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager | UserRole::Cashier)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Cashier => "cashier",
            UserRole::Staff => "staff",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(UserRole::Customer),
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "cashier" => Ok(UserRole::Cashier),
            "staff" => Ok(UserRole::Staff),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

/// Row in the `users` table
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<String>,
    /// NULL for accounts created through OAuth or by staff
    pub password_hash: Option<String>,
    pub role: String,
    pub image: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role_enum(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Customer)
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified.is_some()
    }
}

/// Customer as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<String>,
    pub role: String,
    pub image: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let address = parse_json(user.address.as_deref());
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            email_verified: user.email_verified,
            role: user.role,
            image: user.image,
            phone: user.phone,
            address,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Credentials for either realm's sign-in endpoint
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub phone: Option<String>,
    pub code: Option<String>,
}

/// Customer created from the admin CRM
#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    #[serde(default)]
    pub email: String,
    pub name: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Value>,
    pub image: Option<String>,
    pub role: Option<UserRole>,
}

/// Partial customer update from the admin CRM
#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Value>,
    pub image: Option<String>,
    pub role: Option<UserRole>,
}

/// Self-service profile update
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Value>,
}
