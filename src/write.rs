//! Role <-> permission binding operations, one transaction each
//!
//! No gate runs here; callers that act on behalf of a user go through
//! [`crate::admin::AdminService`].

use crate::db::Store;
use crate::error::{GateError, Result};
use crate::read;
use crate::tx::SyncChanges;

impl Store {
    /// Exact, case-sensitive match on the permission name
    pub fn has_permission(&self, role_id: u64, permission: &str) -> Result<bool> {
        self.read(|d, tx| match read::permission_id_by_name(d, tx, permission)? {
            Some(pid) => d.role_perms.contains(tx, role_id, pid),
            None => Ok(false),
        })
    }

    /// Idempotent; returns whether a binding was added
    pub fn grant(&self, role_id: u64, permission_id: u64) -> Result<bool> {
        self.transact(|tx| tx.grant(role_id, permission_id))
    }

    /// Idempotent; returns whether a binding was removed
    pub fn revoke(&self, role_id: u64, permission_id: u64) -> Result<bool> {
        self.transact(|tx| tx.revoke(role_id, permission_id))
    }

    /// Replace the role's bindings with exactly `permission_ids`, atomically
    pub fn sync_permissions(&self, role_id: u64, permission_ids: &[u64]) -> Result<SyncChanges> {
        self.transact(|tx| tx.sync_permissions(role_id, permission_ids))
    }

    pub fn grant_by_name(&self, role_id: u64, permission: &str) -> Result<bool> {
        self.transact(|tx| {
            let pid = require_named(tx.dbs(), tx.ro(), permission)?;
            tx.grant(role_id, pid)
        })
    }

    pub fn revoke_by_name(&self, role_id: u64, permission: &str) -> Result<bool> {
        self.transact(|tx| match read::permission_id_by_name(tx.dbs(), tx.ro(), permission)? {
            Some(pid) => tx.revoke(role_id, pid),
            None => Ok(false),
        })
    }

    pub fn sync_permissions_by_name(&self, role_id: u64, permissions: &[&str]) -> Result<SyncChanges> {
        self.transact(|tx| {
            let ids = permissions
                .iter()
                .map(|name| require_named(tx.dbs(), tx.ro(), name))
                .collect::<Result<Vec<_>>>()?;
            tx.sync_permissions(role_id, &ids)
        })
    }
}

fn require_named(d: &crate::db::Dbs, tx: &heed::RoTxn, name: &str) -> Result<u64> {
    read::permission_id_by_name(d, tx, name)?.ok_or_else(|| GateError::not_found("permission", name))
}
