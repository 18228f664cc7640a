//! Permission keys, reserved role names and limits

// User management
pub const USERS_VIEW: &str = "users.view";
pub const USERS_CREATE: &str = "users.create";
pub const USERS_EDIT: &str = "users.edit";
pub const USERS_DELETE: &str = "users.delete";
pub const USERS_ACTIVATE: &str = "users.activate";

// Role management
pub const ROLES_VIEW: &str = "roles.view";
pub const ROLES_CREATE: &str = "roles.create";
pub const ROLES_EDIT: &str = "roles.edit";
pub const ROLES_DELETE: &str = "roles.delete";
pub const ROLES_MANAGE: &str = "roles.manage";

// System
pub const SYSTEM_ADMIN: &str = "system.admin";
pub const DASHBOARD_VIEW: &str = "dashboard.view";

/// Keys gated by the admin actions
pub const ADMIN_ABILITIES: &[&str] = &[
    USERS_VIEW,
    USERS_CREATE,
    USERS_EDIT,
    USERS_DELETE,
    USERS_ACTIVATE,
    ROLES_VIEW,
    ROLES_CREATE,
    ROLES_EDIT,
    ROLES_DELETE,
    ROLES_MANAGE,
    SYSTEM_ADMIN,
];

// Modules
pub const MODULE_USERS: &str = "users";
pub const MODULE_ROLES: &str = "roles";
pub const MODULE_SYSTEM: &str = "system";
pub const MODULE_DASHBOARD: &str = "dashboard";

// Reserved roles
pub const SUPER_ADMIN_ROLE: &str = "super_admin";
pub const ADMIN_ROLE: &str = "admin";

/// Role names that are created with `is_system` set
pub const SYSTEM_ROLE_NAMES: &[&str] = &[SUPER_ADMIN_ROLE, ADMIN_ROLE];

pub fn is_reserved_role_name(name: &str) -> bool {
    SYSTEM_ROLE_NAMES.contains(&name)
}

// LMDB
pub const DEFAULT_MAP_SIZE_MB: usize = 1024;
pub const MAX_DBS: u32 = 10;
