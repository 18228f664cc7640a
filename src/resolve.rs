//! Effective permission resolution
//!
//! A user's effective set is the union of its role's permissions and its
//! ad-hoc `additional_permissions`. It is computed from the loaded state on
//! every check; nothing is cached, so role edits apply to the next check.

use std::collections::BTreeSet;

use crate::constants::SUPER_ADMIN_ROLE;
use crate::models::{Role, User};

/// An acting user loaded with its role and that role's permission names
#[derive(Debug, Clone)]
pub struct Subject {
    pub user: User,
    pub role: Option<Role>,
    pub role_permissions: BTreeSet<String>,
}

impl Subject {
    /// Build a subject from already-loaded parts
    pub fn new(user: User, role: Option<Role>, role_permissions: impl IntoIterator<Item = String>) -> Self {
        let role_permissions = match role {
            Some(_) => role_permissions.into_iter().collect(),
            None => BTreeSet::new(),
        };
        Subject { user, role, role_permissions }
    }

    pub fn id(&self) -> u64 {
        self.user.id
    }

    pub fn effective_permissions(&self) -> BTreeSet<String> {
        effective_permissions(&self.role_permissions, self.user.additional_permissions.as_ref())
    }

    /// Membership test against the effective set, without materialising it
    #[inline]
    pub fn holds(&self, permission: &str) -> bool {
        self.role_permissions.contains(permission)
            || self
                .user
                .additional_permissions
                .as_ref()
                .is_some_and(|extra| extra.contains(permission))
    }

    pub fn is_super_admin(&self) -> bool {
        is_super_admin(self.role.as_ref())
    }
}

pub fn is_super_admin(role: Option<&Role>) -> bool {
    role.is_some_and(|r| r.name == SUPER_ADMIN_ROLE)
}

/// `role_permissions ∪ additional`
pub fn effective_permissions(
    role_permissions: &BTreeSet<String>,
    additional: Option<&BTreeSet<String>>,
) -> BTreeSet<String> {
    let mut set = role_permissions.clone();
    if let Some(extra) = additional {
        set.extend(extra.iter().cloned());
    }
    set
}
