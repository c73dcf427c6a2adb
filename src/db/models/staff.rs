//! Staff accounts and role-based access control for the admin panel.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Staff roles. Permissions are checked through the `can_*` methods only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    /// Everything, including expenses, site content and staff accounts
    Admin,
    /// Catalog, customers and accounting
    Manager,
    /// Point of sale and read-only views
    Cashier,
}

impl StaffRole {
    pub const ALL: [StaffRole; 3] = [StaffRole::Admin, StaffRole::Manager, StaffRole::Cashier];

    /// Dashboard figures, order list and product reads
    pub fn can_view(&self) -> bool {
        true
    }

    /// Ring up sales at the POS terminal
    pub fn can_sell(&self) -> bool {
        true
    }

    /// Create and edit products and categories, adjust stock
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Manager)
    }

    pub fn can_manage_customers(&self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Manager)
    }

    pub fn can_view_accounting(&self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Manager)
    }

    pub fn can_manage_expenses(&self) -> bool {
        matches!(self, StaffRole::Admin)
    }

    pub fn can_edit_site(&self) -> bool {
        matches!(self, StaffRole::Admin)
    }

    pub fn can_manage_staff(&self) -> bool {
        matches!(self, StaffRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Manager => "manager",
            StaffRole::Cashier => "cashier",
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(StaffRole::Admin),
            "manager" => Ok(StaffRole::Manager),
            "cashier" => Ok(StaffRole::Cashier),
            _ => Err(format!("Invalid role. Must be admin, manager, or cashier (got {})", s)),
        }
    }
}

/// Row in the `admin_users` table
#[derive(Debug, Clone, FromRow)]
pub struct StaffUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    pub image: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StaffUser {
    /// `None` when the stored role is outside the staff set
    pub fn role_enum(&self) -> Option<StaffRole> {
        self.role.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUserResponse {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: String,
    pub image: Option<String>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<StaffUser> for StaffUserResponse {
    fn from(user: StaffUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            image: user.image,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SeedStaffRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_matrix() {
        let admin = StaffRole::Admin;
        let manager = StaffRole::Manager;
        let cashier = StaffRole::Cashier;

        for role in StaffRole::ALL {
            assert!(role.can_view());
            assert!(role.can_sell());
        }

        assert!(admin.can_manage_catalog() && manager.can_manage_catalog());
        assert!(!cashier.can_manage_catalog());
        assert!(manager.can_manage_customers() && !cashier.can_manage_customers());
        assert!(manager.can_view_accounting() && !cashier.can_view_accounting());

        assert!(admin.can_manage_expenses());
        assert!(!manager.can_manage_expenses());
        assert!(admin.can_edit_site() && !manager.can_edit_site());
        assert!(admin.can_manage_staff() && !cashier.can_manage_staff());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("ADMIN".parse::<StaffRole>().unwrap(), StaffRole::Admin);
        assert!("customer".parse::<StaffRole>().is_err());
        assert!("staff".parse::<StaffRole>().is_err());
    }
}
