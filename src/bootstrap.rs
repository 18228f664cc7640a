//! Bootstrap and catalog seeding

use crate::constants::*;
use crate::db::Store;
use crate::error::{GateError, Result};
use crate::models::{NewRole, NewUser, User};
use crate::read;
use crate::registry::PermissionRegistry;
use crate::tx::Tx;

const BOOTSTRAPPED: &str = "bootstrapped";

/// (name, display name, description, module)
const PERMISSIONS: &[(&str, &str, &str, &str)] = &[
    (USERS_VIEW, "View Users", "Can view user list and details", MODULE_USERS),
    (USERS_CREATE, "Create Users", "Can create new users", MODULE_USERS),
    (USERS_EDIT, "Edit Users", "Can edit existing users", MODULE_USERS),
    (USERS_DELETE, "Delete Users", "Can delete users", MODULE_USERS),
    (USERS_ACTIVATE, "Activate/Deactivate Users", "Can activate or deactivate users", MODULE_USERS),
    (ROLES_VIEW, "View Roles", "Can view roles and permissions", MODULE_ROLES),
    (ROLES_CREATE, "Create Roles", "Can create new roles", MODULE_ROLES),
    (ROLES_EDIT, "Edit Roles", "Can edit existing roles", MODULE_ROLES),
    (ROLES_DELETE, "Delete Roles", "Can delete roles", MODULE_ROLES),
    (ROLES_MANAGE, "Manage Permissions", "Can assign permissions to roles", MODULE_ROLES),
    (SYSTEM_ADMIN, "System Administration", "Full system administration access", MODULE_SYSTEM),
    (DASHBOARD_VIEW, "View Dashboard", "Can access the admin dashboard", MODULE_DASHBOARD),
];

/// Default roles: (name, display name, description, permissions). `None` means all.
const ROLES: &[(&str, &str, &str, Option<&[&str]>)] = &[
    (SUPER_ADMIN_ROLE, "Super Admin", "Full access to every part of the system", None),
    (
        "school_admin",
        "School Admin",
        "Manages school staff and student accounts",
        Some(&[DASHBOARD_VIEW, USERS_VIEW, USERS_CREATE, USERS_EDIT, USERS_ACTIVATE]),
    ),
    (
        "international_school",
        "International School",
        "Partner school with read access to users",
        Some(&[DASHBOARD_VIEW, USERS_VIEW]),
    ),
    ("student", "Student", "Student account", Some(&[DASHBOARD_VIEW])),
];

/// Initial super admin account
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

pub fn is_bootstrapped(store: &Store) -> Result<bool> {
    store.read(|d, tx| Ok(d.meta.get(tx, BOOTSTRAPPED)?.is_some()))
}

/// Create missing catalog entries and default roles. Safe to run repeatedly.
pub fn seed_catalog(store: &Store) -> Result<PermissionRegistry> {
    store.transact(seed_in)?;
    store.registry()
}

fn seed_in(tx: &mut Tx<'_>) -> Result<()> {
    let mut added = 0usize;
    for &(name, display, description, module) in PERMISSIONS {
        if read::permission_id_by_name(tx.dbs(), tx.ro(), name)?.is_none() {
            tx.insert_permission(name, display, Some(description), module)?;
            added += 1;
        }
    }
    for &(name, display, description, perms) in ROLES {
        if read::role_by_name(tx.dbs(), tx.ro(), name)?.is_some() {
            continue;
        }
        let role = tx.insert_role(&NewRole {
            name: name.to_string(),
            display_name: display.to_string(),
            description: Some(description.to_string()),
            is_active: Some(true),
            permissions: None,
        })?;
        let ids = match perms {
            Some(names) => names
                .iter()
                .map(|n| {
                    read::permission_id_by_name(tx.dbs(), tx.ro(), n)?
                        .ok_or_else(|| GateError::not_found("permission", n))
                })
                .collect::<Result<Vec<_>>>()?,
            None => read::all_permissions(tx.dbs(), tx.ro())?.into_iter().map(|p| p.id).collect(),
        };
        tx.sync_permissions(role.id, &ids)?;
        tracing::info!(role = name, permissions = ids.len(), "Seeded role");
    }
    if added > 0 {
        tracing::info!(added, "Seeded permission catalog");
    }
    Ok(())
}

/// Seed the catalog and create the initial super admin. Runs once.
pub fn bootstrap(store: &Store, admin: &BootstrapAdmin) -> Result<User> {
    if is_bootstrapped(store)? {
        return Err(GateError::AlreadyBootstrapped);
    }
    let user = store.transact(|tx| {
        if tx.dbs().meta.get(tx.ro(), BOOTSTRAPPED)?.is_some() {
            return Err(GateError::AlreadyBootstrapped);
        }
        seed_in(tx)?;
        let role = read::role_by_name(tx.dbs(), tx.ro(), SUPER_ADMIN_ROLE)?
            .ok_or_else(|| GateError::not_found("role", SUPER_ADMIN_ROLE))?;
        let user = tx.insert_user(&NewUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            phone: None,
            password_hash: admin.password_hash.clone(),
            role_id: Some(role.id),
            is_active: Some(true),
            additional_permissions: None,
        })?;
        tx.set_meta(BOOTSTRAPPED, &user.id.to_string())?;
        Ok(user)
    })?;
    tracing::info!(user_id = user.id, email = %user.email, "Bootstrapped super admin");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_matches_abilities() {
        for key in ADMIN_ABILITIES {
            assert!(PERMISSIONS.iter().any(|p| p.0 == *key), "{} missing from catalog", key);
        }
    }

    #[test]
    fn default_role_permissions_exist() {
        for (_, _, _, perms) in ROLES {
            for p in perms.iter().flat_map(|s| s.iter()) {
                assert!(PERMISSIONS.iter().any(|e| e.0 == *p), "{}", p);
            }
        }
    }
}
