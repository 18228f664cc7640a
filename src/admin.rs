//! Admin actions over roles and users
//!
//! Every action runs in a single transaction: load the acting subject, ask
//! the gate, validate the payload, apply the protection rules, then write.
//! Nothing is committed unless all of them pass.

use std::sync::Arc;

use heed::RoTxn;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::constants::*;
use crate::db::{Dbs, Store};
use crate::error::GateError;
use crate::gate::Gate;
use crate::models::{
    NewRole, NewUser, Role, RoleDetail, RoleFilter, RoleRef, RoleSummary, RoleUpdate, User, UserDetail, UserFilter, UserRef,
    UserSummary, UserUpdate,
};
use crate::protected::{self, Operation, Violation};
use crate::read;
use crate::registry::PermissionRegistry;
use crate::resolve::Subject;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("missing permission '{permission}'")]
    Forbidden { permission: String },

    #[error("{0}")]
    Blocked(#[from] Violation),

    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Gate(#[from] GateError),
}

impl AdminError {
    /// True only for storage or corruption faults
    pub fn is_fault(&self) -> bool {
        matches!(self, AdminError::Gate(GateError::Storage(_) | GateError::Corrupt(_)))
    }
}

pub type AdminResult<T> = std::result::Result<T, AdminError>;

pub struct AdminService {
    store: Arc<Store>,
    gate: Gate,
}

impl AdminService {
    pub fn new(store: Arc<Store>, gate: Gate) -> Self {
        AdminService { store, gate }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Load the actor and require `permission`. Unknown actors are forbidden.
    fn authorize(&self, d: &Dbs, tx: &RoTxn, actor_id: u64, permission: &str) -> AdminResult<Subject> {
        let forbidden = || AdminError::Forbidden { permission: permission.to_string() };
        let subject = match read::load_subject(d, tx, actor_id) {
            Err(GateError::NotFound { .. }) => return Err(forbidden()),
            r => r?,
        };
        if self.gate.check(&subject, permission).is_allowed() {
            Ok(subject)
        } else {
            Err(forbidden())
        }
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub fn list_roles(&self, actor_id: u64, filter: &RoleFilter) -> AdminResult<Vec<RoleSummary>> {
        self.store.read(|d, tx| {
            self.authorize(d, tx, actor_id, ROLES_VIEW)?;
            let needle = filter.search.as_deref().map(str::to_lowercase);
            let mut out = Vec::new();
            for role in read::all_roles(d, tx)?.into_iter().rev() {
                if filter.status.is_some_and(|s| !s.matches(role.is_active)) {
                    continue;
                }
                if let Some(n) = &needle {
                    let hit = role.name.to_lowercase().contains(n)
                        || role.display_name.to_lowercase().contains(n)
                        || role.description.as_deref().is_some_and(|t| t.to_lowercase().contains(n));
                    if !hit {
                        continue;
                    }
                }
                out.push(RoleSummary {
                    id: role.id,
                    permissions_count: read::permissions_count(d, tx, role.id)?,
                    users_count: read::users_count(d, tx, role.id)?,
                    display_name: role.display_name,
                    name: role.name,
                    is_active: role.is_active,
                    created_at: role.created_at,
                });
            }
            Ok(out)
        })
    }

    pub fn show_role(&self, actor_id: u64, role_id: u64) -> AdminResult<RoleDetail> {
        self.store.read(|d, tx| {
            self.authorize(d, tx, actor_id, ROLES_VIEW)?;
            let record = read::load_role(d, tx, role_id)?;
            let users = read::role_members(d, tx, role_id)?
                .into_iter()
                .map(|u| UserRef { id: u.id, name: u.name, email: u.email })
                .collect();
            Ok(RoleDetail { role: record.role, permissions: record.permissions, users })
        })
    }

    pub fn permission_catalog(&self, actor_id: u64) -> AdminResult<PermissionRegistry> {
        self.store.read(|d, tx| {
            self.authorize(d, tx, actor_id, ROLES_VIEW)?;
            Ok(PermissionRegistry::from_permissions(read::all_permissions(d, tx)?))
        })
    }

    pub fn create_role(&self, actor_id: u64, data: &NewRole) -> AdminResult<Role> {
        self.store.transact(|tx| {
            self.authorize(tx.dbs(), tx.ro(), actor_id, ROLES_CREATE)?;
            data.validate()?;
            let ids = data.permissions.clone().unwrap_or_default();
            check_permission_ids(tx.dbs(), tx.ro(), &ids)?;
            let role = tx.insert_role(data)?;
            tx.sync_permissions(role.id, &ids)?;
            tracing::info!(actor_id, role_id = role.id, name = %role.name, permissions = ids.len(), "Role created");
            Ok(role)
        })
    }

    /// Full update; an absent permission list clears the bindings
    pub fn update_role(&self, actor_id: u64, role_id: u64, data: &RoleUpdate) -> AdminResult<Role> {
        self.store.transact(|tx| {
            let actor = self.authorize(tx.dbs(), tx.ro(), actor_id, ROLES_EDIT)?;
            data.validate()?;
            let current = read::require_role(tx.dbs(), tx.ro(), role_id)?;
            if current.name != data.name {
                protected::evaluate(&actor, &Operation::RenameRole { role: &current })?;
            }
            if current.is_active && data.is_active == Some(false) {
                protected::evaluate(&actor, &Operation::DeactivateRole { role: &current })?;
            }
            let ids = data.permissions.clone().unwrap_or_default();
            check_permission_ids(tx.dbs(), tx.ro(), &ids)?;
            let role = tx.update_role(role_id, data)?;
            let changes = tx.sync_permissions(role_id, &ids)?;
            tracing::info!(
                actor_id,
                role_id,
                attached = changes.attached.len(),
                detached = changes.detached.len(),
                "Role updated"
            );
            Ok(role)
        })
    }

    pub fn delete_role(&self, actor_id: u64, role_id: u64) -> AdminResult<()> {
        self.store.transact(|tx| {
            let actor = self.authorize(tx.dbs(), tx.ro(), actor_id, ROLES_DELETE)?;
            let role = read::require_role(tx.dbs(), tx.ro(), role_id)?;
            let users_count = read::users_count(tx.dbs(), tx.ro(), role_id)?;
            protected::evaluate(&actor, &Operation::DeleteRole { role: &role, users_count })?;
            tx.remove_role(role_id)?;
            tracing::info!(actor_id, role_id, name = %role.name, "Role deleted");
            Ok(())
        })
    }

    pub fn toggle_role_status(&self, actor_id: u64, role_id: u64) -> AdminResult<Role> {
        self.store.transact(|tx| {
            let actor = self.authorize(tx.dbs(), tx.ro(), actor_id, ROLES_EDIT)?;
            let role = read::require_role(tx.dbs(), tx.ro(), role_id)?;
            if role.is_active {
                protected::evaluate(&actor, &Operation::DeactivateRole { role: &role })?;
            }
            let role = tx.set_role_active(role_id, !role.is_active)?;
            tracing::info!(actor_id, role_id, is_active = role.is_active, "Role status toggled");
            Ok(role)
        })
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn list_users(&self, actor_id: u64, filter: &UserFilter) -> AdminResult<Vec<UserSummary>> {
        self.store.read(|d, tx| {
            self.authorize(d, tx, actor_id, USERS_VIEW)?;
            let needle = filter.search.as_deref().map(str::to_lowercase);
            let mut out = Vec::new();
            for user in read::all_users(d, tx)?.into_iter().rev() {
                if filter.status.is_some_and(|s| !s.matches(user.is_active)) {
                    continue;
                }
                if let Some(n) = &needle {
                    let hit = user.name.to_lowercase().contains(n)
                        || user.email.to_lowercase().contains(n)
                        || user.phone.as_deref().is_some_and(|p| p.to_lowercase().contains(n));
                    if !hit {
                        continue;
                    }
                }
                let role = match user.role_id {
                    Some(id) => read::get_role(d, tx, id)?,
                    None => None,
                };
                if let Some(wanted) = &filter.role {
                    if role.as_ref().map(|r| &r.name) != Some(wanted) {
                        continue;
                    }
                }
                out.push(UserSummary {
                    id: user.id,
                    name: user.name,
                    email: user.email,
                    role: role.as_ref().map(RoleRef::from),
                    is_active: user.is_active,
                    last_login_at: user.last_login_at,
                    created_at: user.created_at,
                });
            }
            Ok(out)
        })
    }

    pub fn show_user(&self, actor_id: u64, user_id: u64) -> AdminResult<UserDetail> {
        self.store.read(|d, tx| {
            self.authorize(d, tx, actor_id, USERS_VIEW)?;
            let user = read::require_user(d, tx, user_id)?;
            Ok(detail(d, tx, &user)?)
        })
    }

    pub fn create_user(&self, actor_id: u64, data: &NewUser) -> AdminResult<UserDetail> {
        self.store.transact(|tx| {
            self.authorize(tx.dbs(), tx.ro(), actor_id, USERS_CREATE)?;
            data.validate()?;
            check_permission_names(tx.dbs(), tx.ro(), data.additional_permissions.as_deref())?;
            let user = tx.insert_user(data)?;
            tracing::info!(actor_id, user_id = user.id, role_id = ?user.role_id, "User created");
            Ok(detail(tx.dbs(), tx.ro(), &user)?)
        })
    }

    /// Full update; the password hash is replaced only when present
    pub fn update_user(&self, actor_id: u64, user_id: u64, data: &UserUpdate) -> AdminResult<UserDetail> {
        self.store.transact(|tx| {
            let actor = self.authorize(tx.dbs(), tx.ro(), actor_id, USERS_EDIT)?;
            data.validate()?;
            let current = read::require_user(tx.dbs(), tx.ro(), user_id)?;
            let role = role_of(tx.dbs(), tx.ro(), &current)?;
            if current.role_id != data.role_id {
                protected::evaluate(&actor, &Operation::ChangeUserRole { user: &current, role: role.as_ref() })?;
            }
            if current.is_active && data.is_active == Some(false) {
                protected::evaluate(&actor, &Operation::DeactivateUser { user: &current, role: role.as_ref() })?;
            }
            check_permission_names(tx.dbs(), tx.ro(), data.additional_permissions.as_deref())?;
            let user = tx.update_user(user_id, data)?;
            tracing::info!(actor_id, user_id, role_id = ?user.role_id, "User updated");
            Ok(detail(tx.dbs(), tx.ro(), &user)?)
        })
    }

    pub fn delete_user(&self, actor_id: u64, user_id: u64) -> AdminResult<()> {
        self.store.transact(|tx| {
            let actor = self.authorize(tx.dbs(), tx.ro(), actor_id, USERS_DELETE)?;
            let user = read::require_user(tx.dbs(), tx.ro(), user_id)?;
            let role = role_of(tx.dbs(), tx.ro(), &user)?;
            protected::evaluate(&actor, &Operation::DeleteUser { user: &user, role: role.as_ref() })?;
            tx.remove_user(user_id)?;
            tracing::info!(actor_id, user_id, "User deleted");
            Ok(())
        })
    }

    pub fn toggle_user_status(&self, actor_id: u64, user_id: u64) -> AdminResult<UserDetail> {
        self.store.transact(|tx| {
            let actor = self.authorize(tx.dbs(), tx.ro(), actor_id, USERS_ACTIVATE)?;
            let user = read::require_user(tx.dbs(), tx.ro(), user_id)?;
            if user.is_active {
                let role = role_of(tx.dbs(), tx.ro(), &user)?;
                protected::evaluate(&actor, &Operation::DeactivateUser { user: &user, role: role.as_ref() })?;
            }
            let user = tx.set_user_active(user_id, !user.is_active)?;
            tracing::info!(actor_id, user_id, is_active = user.is_active, "User status toggled");
            Ok(detail(tx.dbs(), tx.ro(), &user)?)
        })
    }

    /// Stamp `last_login_at`; called by the authentication layer, not gated
    pub fn record_login(&self, user_id: u64) -> AdminResult<User> {
        let user = self.store.transact(|tx| tx.touch_login(user_id))?;
        tracing::debug!(user_id, "Login recorded");
        Ok(user)
    }
}

fn role_of(d: &Dbs, tx: &RoTxn, user: &User) -> Result<Option<Role>, GateError> {
    match user.role_id {
        Some(id) => read::get_role(d, tx, id),
        None => Ok(None),
    }
}

fn detail(d: &Dbs, tx: &RoTxn, user: &User) -> Result<UserDetail, GateError> {
    let role = role_of(d, tx, user)?;
    Ok(UserDetail::new(user, role.as_ref()))
}

fn check_permission_ids(d: &Dbs, tx: &RoTxn, ids: &[u64]) -> Result<(), GateError> {
    for &id in ids {
        if read::get_permission(d, tx, id)?.is_none() {
            return Err(GateError::Validation(format!("permission {} does not exist", id)));
        }
    }
    Ok(())
}

/// Additional permissions must name catalog entries
fn check_permission_names(d: &Dbs, tx: &RoTxn, names: Option<&[String]>) -> Result<(), GateError> {
    for name in names.unwrap_or_default() {
        if read::permission_id_by_name(d, tx, name)?.is_none() {
            return Err(GateError::Validation(format!("unknown permission '{}'", name)));
        }
    }
    Ok(())
}
