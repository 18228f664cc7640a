//! Read operations (no permission checks, direct LMDB access)
//!
//! Every loader takes the handles and a read transaction, so the same code
//! serves [`Store::read`] snapshots and pending write transactions via
//! [`crate::tx::Tx::ro`].

use std::collections::BTreeSet;

use heed::RoTxn;

use crate::db::{Dbs, Store};
use crate::error::{GateError, Result};
use crate::models::{Permission, Role, User};
use crate::resolve::Subject;

/// A role with its bound permissions and the number of users referencing it
#[derive(Debug, Clone)]
pub struct RoleRecord {
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub users_count: usize,
}

pub fn get_permission(d: &Dbs, tx: &RoTxn, id: u64) -> Result<Option<Permission>> {
    Ok(d.permissions.get(tx, &id)?)
}

pub fn require_permission(d: &Dbs, tx: &RoTxn, id: u64) -> Result<Permission> {
    get_permission(d, tx, id)?.ok_or_else(|| GateError::not_found("permission", id))
}

pub fn permission_id_by_name(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<u64>> {
    Ok(d.permission_names.get(tx, name)?)
}

pub fn all_permissions(d: &Dbs, tx: &RoTxn) -> Result<Vec<Permission>> {
    let mut r = Vec::new();
    for item in d.permissions.iter(tx)? {
        let (_, p) = item?;
        r.push(p);
    }
    Ok(r)
}

pub fn get_role(d: &Dbs, tx: &RoTxn, id: u64) -> Result<Option<Role>> {
    Ok(d.roles.get(tx, &id)?)
}

pub fn require_role(d: &Dbs, tx: &RoTxn, id: u64) -> Result<Role> {
    get_role(d, tx, id)?.ok_or_else(|| GateError::not_found("role", id))
}

pub fn role_by_name(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<Role>> {
    match d.role_names.get(tx, name)? {
        Some(id) => get_role(d, tx, id),
        None => Ok(None),
    }
}

pub fn all_roles(d: &Dbs, tx: &RoTxn) -> Result<Vec<Role>> {
    let mut r = Vec::new();
    for item in d.roles.iter(tx)? {
        let (_, role) = item?;
        r.push(role);
    }
    Ok(r)
}

/// Permissions bound to a role, in id order
pub fn role_permissions(d: &Dbs, tx: &RoTxn, role_id: u64) -> Result<Vec<Permission>> {
    let mut r = Vec::new();
    for id in d.role_perms.list(tx, role_id)? {
        match get_permission(d, tx, id)? {
            Some(p) => r.push(p),
            None => return Err(GateError::Corrupt(format!("role {} bound to missing permission {}", role_id, id))),
        }
    }
    Ok(r)
}

pub fn role_permission_names(d: &Dbs, tx: &RoTxn, role_id: u64) -> Result<BTreeSet<String>> {
    Ok(role_permissions(d, tx, role_id)?.into_iter().map(|p| p.name).collect())
}

pub fn permissions_count(d: &Dbs, tx: &RoTxn, role_id: u64) -> Result<usize> {
    d.role_perms.count(tx, role_id)
}

pub fn users_count(d: &Dbs, tx: &RoTxn, role_id: u64) -> Result<usize> {
    d.role_users.count(tx, role_id)
}

pub fn role_members(d: &Dbs, tx: &RoTxn, role_id: u64) -> Result<Vec<User>> {
    let mut r = Vec::new();
    for id in d.role_users.list(tx, role_id)? {
        if let Some(u) = get_user(d, tx, id)? {
            r.push(u);
        }
    }
    Ok(r)
}

/// Load a role with its permissions and a count of referencing users
pub fn load_role(d: &Dbs, tx: &RoTxn, role_id: u64) -> Result<RoleRecord> {
    Ok(RoleRecord {
        role: require_role(d, tx, role_id)?,
        permissions: role_permissions(d, tx, role_id)?,
        users_count: users_count(d, tx, role_id)?,
    })
}

pub fn get_user(d: &Dbs, tx: &RoTxn, id: u64) -> Result<Option<User>> {
    Ok(d.users.get(tx, &id)?)
}

pub fn require_user(d: &Dbs, tx: &RoTxn, id: u64) -> Result<User> {
    get_user(d, tx, id)?.ok_or_else(|| GateError::not_found("user", id))
}

pub fn user_by_email(d: &Dbs, tx: &RoTxn, email: &str) -> Result<Option<User>> {
    match d.user_emails.get(tx, email)? {
        Some(id) => get_user(d, tx, id),
        None => Ok(None),
    }
}

pub fn all_users(d: &Dbs, tx: &RoTxn) -> Result<Vec<User>> {
    let mut r = Vec::new();
    for item in d.users.iter(tx)? {
        let (_, u) = item?;
        r.push(u);
    }
    Ok(r)
}

/// Load a user together with its role and the role's permission names
pub fn load_subject(d: &Dbs, tx: &RoTxn, user_id: u64) -> Result<Subject> {
    let user = require_user(d, tx, user_id)?;
    let (role, role_permissions) = match user.role_id {
        Some(role_id) => match get_role(d, tx, role_id)? {
            Some(role) => {
                let names = role_permission_names(d, tx, role_id)?;
                (Some(role), names)
            }
            None => (None, BTreeSet::new()),
        },
        None => (None, BTreeSet::new()),
    };
    Ok(Subject { user, role, role_permissions })
}

impl Store {
    pub fn load_subject(&self, user_id: u64) -> Result<Subject> {
        self.read(|d, tx| load_subject(d, tx, user_id))
    }

    pub fn load_role(&self, role_id: u64) -> Result<RoleRecord> {
        self.read(|d, tx| load_role(d, tx, role_id))
    }

    pub fn role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.read(|d, tx| role_by_name(d, tx, name))
    }

    pub fn user(&self, user_id: u64) -> Result<Option<User>> {
        self.read(|d, tx| get_user(d, tx, user_id))
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|d, tx| user_by_email(d, tx, email))
    }

    pub fn role_permissions(&self, role_id: u64) -> Result<Vec<Permission>> {
        self.read(|d, tx| role_permissions(d, tx, role_id))
    }

    pub fn users_count(&self, role_id: u64) -> Result<usize> {
        self.read(|d, tx| users_count(d, tx, role_id))
    }
}
