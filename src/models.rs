//! Entities, payloads and read projections

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Catalog entry, referenced everywhere by its unique `name` (e.g. `users.edit`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    /// Reserved roles cannot be deleted, deactivated or renamed
    #[serde(default)]
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password_hash: String,
    #[serde(default)]
    pub role_id: Option<u64>,
    pub is_active: bool,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    /// Ad-hoc grants on top of the role, stored as permission names
    #[serde(default)]
    pub additional_permissions: Option<BTreeSet<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Payloads
// ============================================================================

pub(crate) fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        Ok(())
    } else {
        let mut e = ValidationError::new("role_name");
        e.message = Some("must contain only lowercase letters and underscores".into());
        Err(e)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRole {
    #[validate(length(min = 1, max = 255), custom(function = "validate_role_name"))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    /// Permission ids to bind
    #[serde(default)]
    pub permissions: Option<Vec<u64>>,
}

/// Full replacement of a role's editable fields; absent `permissions` clears the bindings
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoleUpdate {
    #[validate(length(min = 1, max = 255), custom(function = "validate_role_name"))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub permissions: Option<Vec<u64>>,
}

/// Password hashing happens upstream; only the hash reaches this crate.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub password_hash: String,
    pub role_id: Option<u64>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub additional_permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    /// Replaced only when present
    #[validate(length(min = 1))]
    pub password_hash: Option<String>,
    pub role_id: Option<u64>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub additional_permissions: Option<Vec<String>>,
}

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    pub fn matches(self, is_active: bool) -> bool {
        match self {
            Status::Active => is_active,
            Status::Inactive => !is_active,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleFilter {
    pub search: Option<String>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub search: Option<String>,
    /// Role name
    pub role: Option<String>,
    pub status: Option<Status>,
}

// ============================================================================
// Projections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub id: u64,
    pub display_name: String,
    pub name: String,
    pub is_active: bool,
    pub permissions_count: usize,
    pub users_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRef {
    pub id: u64,
    pub name: String,
    pub display_name: String,
}

impl From<&Role> for RoleRef {
    fn from(r: &Role) -> Self {
        RoleRef { id: r.id, name: r.name.clone(), display_name: r.display_name.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Option<RoleRef>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Role with its bindings and members, for the role detail page
#[derive(Debug, Clone, Serialize)]
pub struct RoleDetail {
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub users: Vec<UserRef>,
}

/// User without the password hash
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<RoleRef>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub additional_permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserDetail {
    pub fn new(user: &User, role: Option<&Role>) -> Self {
        UserDetail {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: role.map(RoleRef::from),
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            additional_permissions: user
                .additional_permissions
                .iter()
                .flatten()
                .cloned()
                .collect(),
            created_at: user.created_at,
        }
    }
}
