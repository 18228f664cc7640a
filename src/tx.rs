//! Write transactions
//!
//! Every mutation runs inside [`Store::transact`]: one LMDB write transaction
//! that commits only when the closure returns `Ok`. LMDB admits a single
//! writer and readers only ever see committed snapshots, so checks made
//! through the transaction hold until commit.

use std::collections::BTreeSet;

use chrono::Utc;
use heed::{RoTxn, RwTxn};

use crate::db::{Dbs, Store};
use crate::error::{GateError, Result};
use crate::models::{NewRole, NewUser, Permission, Role, RoleUpdate, User, UserUpdate};
use crate::read;

/// Outcome of replacing a role's permission set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncChanges {
    pub attached: Vec<u64>,
    pub detached: Vec<u64>,
}

/// Transaction wrapper for writes
pub struct Tx<'e> {
    txn: RwTxn<'e>,
    dbs: &'e Dbs,
}

impl<'e> Tx<'e> {
    /// Read view of the pending transaction (sees its own writes)
    #[inline]
    pub fn ro(&self) -> &RoTxn<'e> {
        &self.txn
    }

    #[inline]
    pub fn dbs(&self) -> &'e Dbs {
        self.dbs
    }

    fn next_id(&mut self, counter: &str) -> Result<u64> {
        let k = format!("next_id:{}", counter);
        let id = self
            .dbs
            .meta
            .get(&self.txn, &k)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(1u64);
        self.dbs.meta.put(&mut self.txn, &k, &(id + 1).to_string())?;
        Ok(id)
    }

    pub(crate) fn set_meta(&mut self, k: &str, v: &str) -> Result<()> {
        self.dbs.meta.put(&mut self.txn, k, v)?;
        Ok(())
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    /// Add a catalog entry. Names are unique.
    pub fn insert_permission(
        &mut self,
        name: &str,
        display_name: &str,
        description: Option<&str>,
        module: &str,
    ) -> Result<Permission> {
        if self.dbs.permission_names.get(&self.txn, name)?.is_some() {
            return Err(GateError::Duplicate(format!("permission '{}' already exists", name)));
        }
        let p = Permission {
            id: self.next_id("permission")?,
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: description.map(str::to_string),
            module: module.to_string(),
        };
        self.dbs.permissions.put(&mut self.txn, &p.id, &p)?;
        self.dbs.permission_names.put(&mut self.txn, &p.name, &p.id)?;
        Ok(p)
    }

    // ========================================================================
    // Role <-> permission bindings
    // ========================================================================

    /// Bind a permission to a role. Returns false if it was already bound.
    pub fn grant(&mut self, role_id: u64, permission_id: u64) -> Result<bool> {
        read::require_role(self.dbs, &self.txn, role_id)?;
        read::require_permission(self.dbs, &self.txn, permission_id)?;
        self.dbs.role_perms.link(&mut self.txn, role_id, permission_id)
    }

    /// Unbind a permission from a role. Returns false if it was not bound.
    pub fn revoke(&mut self, role_id: u64, permission_id: u64) -> Result<bool> {
        self.dbs.role_perms.unlink(&mut self.txn, role_id, permission_id)
    }

    /// Replace the role's bindings with exactly `permission_ids`
    pub fn sync_permissions(&mut self, role_id: u64, permission_ids: &[u64]) -> Result<SyncChanges> {
        read::require_role(self.dbs, &self.txn, role_id)?;
        let wanted: BTreeSet<u64> = permission_ids.iter().copied().collect();
        for &id in &wanted {
            read::require_permission(self.dbs, &self.txn, id)?;
        }
        let current: BTreeSet<u64> = self.dbs.role_perms.list(&self.txn, role_id)?.into_iter().collect();

        let mut changes = SyncChanges::default();
        for &id in current.difference(&wanted) {
            self.dbs.role_perms.unlink(&mut self.txn, role_id, id)?;
            changes.detached.push(id);
        }
        for &id in wanted.difference(&current) {
            self.dbs.role_perms.link(&mut self.txn, role_id, id)?;
            changes.attached.push(id);
        }
        Ok(changes)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    /// Create a role without bindings. `is_system` follows the reserved names.
    pub fn insert_role(&mut self, data: &NewRole) -> Result<Role> {
        if self.dbs.role_names.get(&self.txn, &data.name)?.is_some() {
            return Err(GateError::Duplicate(format!("role '{}' already exists", data.name)));
        }
        let now = Utc::now();
        let role = Role {
            id: self.next_id("role")?,
            name: data.name.clone(),
            display_name: data.display_name.clone(),
            description: data.description.clone(),
            is_active: data.is_active.unwrap_or(true),
            is_system: crate::constants::is_reserved_role_name(&data.name),
            created_at: now,
            updated_at: now,
        };
        self.dbs.roles.put(&mut self.txn, &role.id, &role)?;
        self.dbs.role_names.put(&mut self.txn, &role.name, &role.id)?;
        Ok(role)
    }

    /// Overwrite the editable fields of a role. Bindings are left untouched.
    pub fn update_role(&mut self, role_id: u64, data: &RoleUpdate) -> Result<Role> {
        let mut role = read::require_role(self.dbs, &self.txn, role_id)?;
        if role.name != data.name {
            if self.dbs.role_names.get(&self.txn, &data.name)?.is_some() {
                return Err(GateError::Duplicate(format!("role '{}' already exists", data.name)));
            }
            self.dbs.role_names.delete(&mut self.txn, &role.name)?;
            self.dbs.role_names.put(&mut self.txn, &data.name, &role_id)?;
            role.name = data.name.clone();
            // Taking a reserved name makes the role system; the flag is never cleared.
            role.is_system |= crate::constants::is_reserved_role_name(&role.name);
        }
        role.display_name = data.display_name.clone();
        role.description = data.description.clone();
        if let Some(active) = data.is_active {
            role.is_active = active;
        }
        role.updated_at = Utc::now();
        self.dbs.roles.put(&mut self.txn, &role_id, &role)?;
        Ok(role)
    }

    pub fn set_role_active(&mut self, role_id: u64, active: bool) -> Result<Role> {
        let mut role = read::require_role(self.dbs, &self.txn, role_id)?;
        role.is_active = active;
        role.updated_at = Utc::now();
        self.dbs.roles.put(&mut self.txn, &role_id, &role)?;
        Ok(role)
    }

    /// Delete a role and detach its bindings. Remaining members lose their role.
    pub fn remove_role(&mut self, role_id: u64) -> Result<bool> {
        let Some(role) = read::get_role(self.dbs, &self.txn, role_id)? else {
            return Ok(false);
        };
        self.dbs.role_perms.unlink_all(&mut self.txn, role_id)?;
        for user_id in self.dbs.role_users.list(&self.txn, role_id)? {
            if let Some(mut user) = read::get_user(self.dbs, &self.txn, user_id)? {
                user.role_id = None;
                user.updated_at = Utc::now();
                self.dbs.users.put(&mut self.txn, &user_id, &user)?;
            }
        }
        self.dbs.role_users.unlink_all(&mut self.txn, role_id)?;
        self.dbs.role_names.delete(&mut self.txn, &role.name)?;
        self.dbs.roles.delete(&mut self.txn, &role_id)?;
        Ok(true)
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn insert_user(&mut self, data: &NewUser) -> Result<User> {
        if self.dbs.user_emails.get(&self.txn, &data.email)?.is_some() {
            return Err(GateError::Duplicate(format!("email '{}' is already taken", data.email)));
        }
        if let Some(role_id) = data.role_id {
            self.require_assignable_role(role_id)?;
        }
        let now = Utc::now();
        let user = User {
            id: self.next_id("user")?,
            name: data.name.clone(),
            email: data.email.clone(),
            phone: data.phone.clone(),
            password_hash: data.password_hash.clone(),
            role_id: data.role_id,
            is_active: data.is_active.unwrap_or(true),
            last_login_at: None,
            additional_permissions: data.additional_permissions.as_ref().map(|v| v.iter().cloned().collect()),
            created_at: now,
            updated_at: now,
        };
        self.dbs.users.put(&mut self.txn, &user.id, &user)?;
        self.dbs.user_emails.put(&mut self.txn, &user.email, &user.id)?;
        if let Some(role_id) = user.role_id {
            self.dbs.role_users.link(&mut self.txn, role_id, user.id)?;
        }
        Ok(user)
    }

    pub fn update_user(&mut self, user_id: u64, data: &UserUpdate) -> Result<User> {
        let mut user = read::require_user(self.dbs, &self.txn, user_id)?;
        if user.email != data.email {
            if self.dbs.user_emails.get(&self.txn, &data.email)?.is_some() {
                return Err(GateError::Duplicate(format!("email '{}' is already taken", data.email)));
            }
            self.dbs.user_emails.delete(&mut self.txn, &user.email)?;
            self.dbs.user_emails.put(&mut self.txn, &data.email, &user_id)?;
            user.email = data.email.clone();
        }
        if user.role_id != data.role_id {
            if let Some(new_role) = data.role_id {
                self.require_assignable_role(new_role)?;
            }
            if let Some(old_role) = user.role_id {
                self.dbs.role_users.unlink(&mut self.txn, old_role, user_id)?;
            }
            if let Some(new_role) = data.role_id {
                self.dbs.role_users.link(&mut self.txn, new_role, user_id)?;
            }
            user.role_id = data.role_id;
        }
        user.name = data.name.clone();
        user.phone = data.phone.clone();
        if let Some(hash) = &data.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(active) = data.is_active {
            user.is_active = active;
        }
        user.additional_permissions = data.additional_permissions.as_ref().map(|v| v.iter().cloned().collect());
        user.updated_at = Utc::now();
        self.dbs.users.put(&mut self.txn, &user_id, &user)?;
        Ok(user)
    }

    pub fn set_user_active(&mut self, user_id: u64, active: bool) -> Result<User> {
        let mut user = read::require_user(self.dbs, &self.txn, user_id)?;
        user.is_active = active;
        user.updated_at = Utc::now();
        self.dbs.users.put(&mut self.txn, &user_id, &user)?;
        Ok(user)
    }

    pub fn touch_login(&mut self, user_id: u64) -> Result<User> {
        let mut user = read::require_user(self.dbs, &self.txn, user_id)?;
        user.last_login_at = Some(Utc::now());
        self.dbs.users.put(&mut self.txn, &user_id, &user)?;
        Ok(user)
    }

    pub fn remove_user(&mut self, user_id: u64) -> Result<bool> {
        let Some(user) = read::get_user(self.dbs, &self.txn, user_id)? else {
            return Ok(false);
        };
        if let Some(role_id) = user.role_id {
            self.dbs.role_users.unlink(&mut self.txn, role_id, user_id)?;
        }
        self.dbs.user_emails.delete(&mut self.txn, &user.email)?;
        self.dbs.users.delete(&mut self.txn, &user_id)?;
        Ok(true)
    }

    fn require_assignable_role(&self, role_id: u64) -> Result<()> {
        match read::get_role(self.dbs, &self.txn, role_id)? {
            Some(_) => Ok(()),
            None => Err(GateError::Validation(format!("role {} does not exist", role_id))),
        }
    }

    #[inline]
    fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

impl Store {
    /// Run multiple operations in a single transaction
    #[inline]
    pub fn transact<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<GateError>,
        F: FnOnce(&mut Tx<'_>) -> std::result::Result<T, E>,
    {
        let mut tx = Tx {
            txn: self.env().write_txn().map_err(GateError::from)?,
            dbs: self.dbs(),
        };
        let r = f(&mut tx)?;
        tx.commit()?;
        Ok(r)
    }
}
