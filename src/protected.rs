//! Protection rules for destructive operations
//!
//! Rules run after the gate has allowed an action and before anything is
//! written. Each rule is a pure predicate over the acting subject and the
//! already-loaded target; they are evaluated in a fixed order and the first
//! failure is reported.

use std::fmt;

use thiserror::Error;

use crate::models::{Role, User};
use crate::resolve::{self, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Delete,
    Deactivate,
    Rename,
    ChangeRole,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Delete => "delete",
            Action::Deactivate => "deactivate",
            Action::Rename => "rename",
            Action::ChangeRole => "change the role of",
        })
    }
}

/// A destructive operation with its target loaded
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    DeleteRole { role: &'a Role, users_count: usize },
    DeactivateRole { role: &'a Role },
    RenameRole { role: &'a Role },
    DeleteUser { user: &'a User, role: Option<&'a Role> },
    DeactivateUser { user: &'a User, role: Option<&'a Role> },
    /// `role` is the user's current role, not the one being assigned
    ChangeUserRole { user: &'a User, role: Option<&'a Role> },
}

impl Operation<'_> {
    pub fn action(&self) -> Action {
        match self {
            Operation::DeleteRole { .. } | Operation::DeleteUser { .. } => Action::Delete,
            Operation::DeactivateRole { .. } | Operation::DeactivateUser { .. } => Action::Deactivate,
            Operation::RenameRole { .. } => Action::Rename,
            Operation::ChangeUserRole { .. } => Action::ChangeRole,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Cannot delete role that has assigned users.")]
    RoleHasUsers { users: usize },

    #[error("Cannot {action} system roles.")]
    SystemRole { action: Action },

    #[error("Cannot {action} super admin users.")]
    SuperAdminUser { action: Action },

    #[error("Cannot {action} your own account.")]
    OwnAccount { action: Action },
}

/// Rule 1: a role referenced by users cannot be deleted
pub fn role_unassigned(op: &Operation) -> Result<(), Violation> {
    match *op {
        Operation::DeleteRole { users_count, .. } if users_count > 0 => {
            Err(Violation::RoleHasUsers { users: users_count })
        }
        _ => Ok(()),
    }
}

/// Rule 2: system roles cannot be deleted, deactivated or renamed
pub fn role_not_system(op: &Operation) -> Result<(), Violation> {
    match *op {
        Operation::DeleteRole { role, .. } | Operation::DeactivateRole { role } | Operation::RenameRole { role }
            if role.is_system =>
        {
            Err(Violation::SystemRole { action: op.action() })
        }
        _ => Ok(()),
    }
}

/// Rule 3: super admin users cannot be deleted, deactivated or demoted
pub fn user_not_super_admin(op: &Operation) -> Result<(), Violation> {
    match *op {
        Operation::DeleteUser { role, .. }
        | Operation::DeactivateUser { role, .. }
        | Operation::ChangeUserRole { role, .. }
            if resolve::is_super_admin(role) =>
        {
            Err(Violation::SuperAdminUser { action: op.action() })
        }
        _ => Ok(()),
    }
}

/// Rule 4: nobody deletes, deactivates or reassigns their own account
pub fn not_self(actor: &Subject, op: &Operation) -> Result<(), Violation> {
    match *op {
        Operation::DeleteUser { user, .. }
        | Operation::DeactivateUser { user, .. }
        | Operation::ChangeUserRole { user, .. }
            if user.id == actor.id() =>
        {
            Err(Violation::OwnAccount { action: op.action() })
        }
        _ => Ok(()),
    }
}

/// Every violated rule, in rule order
pub fn violations(actor: &Subject, op: &Operation) -> Vec<Violation> {
    [role_unassigned(op), role_not_system(op), user_not_super_admin(op), not_self(actor, op)]
        .into_iter()
        .filter_map(Result::err)
        .collect()
}

/// Allow, or the first violated rule
pub fn evaluate(actor: &Subject, op: &Operation) -> Result<(), Violation> {
    let r = role_unassigned(op)
        .and_then(|_| role_not_system(op))
        .and_then(|_| user_not_super_admin(op))
        .and_then(|_| not_self(actor, op));
    if let Err(v) = &r {
        tracing::warn!(actor_id = actor.id(), action = %op.action(), reason = %v, "Operation blocked");
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SUPER_ADMIN_ROLE;
    use crate::resolve::tests::{role, user};

    fn actor(id: u64) -> Subject {
        Subject::new(user(id, Some(2), &[]), Some(role(2, "school_admin")), vec!["users.delete".to_string(), "users.activate".to_string()])
    }

    #[test]
    fn role_with_users_then_system_role() {
        let sa = role(1, SUPER_ADMIN_ROLE);
        let a = actor(10);

        let op = Operation::DeleteRole { role: &sa, users_count: 1 };
        assert_eq!(evaluate(&a, &op), Err(Violation::RoleHasUsers { users: 1 }));
        assert_eq!(violations(&a, &op).len(), 2);

        let op = Operation::DeleteRole { role: &sa, users_count: 0 };
        let err = evaluate(&a, &op).unwrap_err();
        assert_eq!(err, Violation::SystemRole { action: Action::Delete });
        assert_eq!(err.to_string(), "Cannot delete system roles.");
    }

    #[test]
    fn ordinary_role_delete_allowed_when_empty() {
        let r = role(3, "student");
        assert!(evaluate(&actor(10), &Operation::DeleteRole { role: &r, users_count: 0 }).is_ok());
        assert_eq!(
            evaluate(&actor(10), &Operation::DeleteRole { role: &r, users_count: 3 })
                .unwrap_err()
                .to_string(),
            "Cannot delete role that has assigned users."
        );
    }

    #[test]
    fn system_role_cannot_be_deactivated_or_renamed() {
        let admin = role(2, "admin");
        assert_eq!(
            evaluate(&actor(10), &Operation::DeactivateRole { role: &admin }).unwrap_err().to_string(),
            "Cannot deactivate system roles."
        );
        assert!(evaluate(&actor(10), &Operation::RenameRole { role: &admin }).is_err());
        let student = role(4, "student");
        assert!(evaluate(&actor(10), &Operation::DeactivateRole { role: &student }).is_ok());
    }

    #[test]
    fn self_deactivation_blocked() {
        let a = actor(10);
        let err = evaluate(&a, &Operation::DeactivateUser { user: &a.user, role: a.role.as_ref() }).unwrap_err();
        assert_eq!(err, Violation::OwnAccount { action: Action::Deactivate });
        assert_eq!(err.to_string(), "Cannot deactivate your own account.");
    }

    #[test]
    fn super_admin_user_delete_blocked() {
        let sa_role = role(1, SUPER_ADMIN_ROLE);
        let target = user(20, Some(1), &[]);
        let err = evaluate(&actor(10), &Operation::DeleteUser { user: &target, role: Some(&sa_role) }).unwrap_err();
        assert_eq!(err.to_string(), "Cannot delete super admin users.");
    }

    #[test]
    fn ordinary_user_delete_allowed() {
        let target = user(21, Some(4), &[]);
        let student = role(4, "student");
        assert!(evaluate(&actor(10), &Operation::DeleteUser { user: &target, role: Some(&student) }).is_ok());
        assert!(violations(&actor(10), &Operation::DeactivateUser { user: &target, role: None }).is_empty());
    }

    #[test]
    fn role_change_rules() {
        let sa_role = role(1, SUPER_ADMIN_ROLE);
        let root = user(1, Some(1), &[]);
        let err = evaluate(&actor(10), &Operation::ChangeUserRole { user: &root, role: Some(&sa_role) }).unwrap_err();
        assert_eq!(err, Violation::SuperAdminUser { action: Action::ChangeRole });
        assert_eq!(err.to_string(), "Cannot change the role of super admin users.");

        let a = actor(10);
        let err = evaluate(&a, &Operation::ChangeUserRole { user: &a.user, role: a.role.as_ref() }).unwrap_err();
        assert_eq!(err.to_string(), "Cannot change the role of your own account.");

        let student = role(4, "student");
        let target = user(21, Some(4), &[]);
        assert!(evaluate(&a, &Operation::ChangeUserRole { user: &target, role: Some(&student) }).is_ok());
    }

    #[test]
    fn super_admin_deleting_self_reports_super_admin_first() {
        let sa_role = role(1, SUPER_ADMIN_ROLE);
        let me = Subject::new(user(1, Some(1), &[]), Some(sa_role.clone()), Vec::new());
        let op = Operation::DeleteUser { user: &me.user, role: Some(&sa_role) };
        assert_eq!(evaluate(&me, &op), Err(Violation::SuperAdminUser { action: Action::Delete }));
        assert_eq!(violations(&me, &op).len(), 2);
    }
}
