//! Authorization gate
//!
//! One generic check parameterized by key replaces per-ability wiring. The
//! gate holds no state beyond the set of keys it knows about, which is only
//! used for diagnostics: the decision is always the plain membership test.

use std::collections::BTreeSet;

use crate::constants::ADMIN_ABILITIES;
use crate::registry::PermissionRegistry;
use crate::resolve::Subject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    #[inline]
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl From<bool> for Decision {
    fn from(b: bool) -> Self {
        if b { Decision::Allow } else { Decision::Deny }
    }
}

#[derive(Debug, Clone)]
pub struct Gate {
    known: BTreeSet<String>,
}

impl Default for Gate {
    fn default() -> Self {
        Gate::new(ADMIN_ABILITIES.iter().copied())
    }
}

impl Gate {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        Gate { known: keys.into_iter().map(str::to_string).collect() }
    }

    /// Gate that knows every key in the catalog
    pub fn from_registry(registry: &PermissionRegistry) -> Self {
        Gate::new(registry.names())
    }

    /// May `subject` perform the action requiring `permission`?
    pub fn check(&self, subject: &Subject, permission: &str) -> Decision {
        if !self.known.contains(permission) {
            tracing::debug!(permission, "Checking unregistered permission key");
        }
        let decision = Decision::from(subject.holds(permission));
        if !decision.is_allowed() {
            tracing::debug!(user_id = subject.id(), permission, "Permission denied");
        }
        decision
    }

    pub fn abilities(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::tests::{role, user};

    fn student(extra: &[&str]) -> Subject {
        Subject::new(user(7, Some(4), extra), Some(role(4, "student")), vec!["dashboard.view".to_string()])
    }

    #[test]
    fn student_sees_dashboard_only() {
        let gate = Gate::default();
        let u = student(&[]);
        assert_eq!(gate.check(&u, "dashboard.view"), Decision::Allow);
        assert_eq!(gate.check(&u, "users.delete"), Decision::Deny);
    }

    #[test]
    fn additional_permission_overrides_role() {
        let gate = Gate::default();
        let u = student(&["users.view"]);
        assert!(gate.check(&u, "users.view").is_allowed());
        assert!(!gate.check(&u, "users.edit").is_allowed());
    }

    #[test]
    fn unknown_key_is_plain_membership() {
        let gate = Gate::default();
        assert!(!gate.check(&student(&[]), "reports.export").is_allowed());
        assert!(gate.check(&student(&["reports.export"]), "reports.export").is_allowed());
    }

    #[test]
    fn check_is_case_sensitive() {
        let gate = Gate::default();
        assert_eq!(gate.check(&student(&[]), "Dashboard.View"), Decision::Deny);
    }

    #[test]
    fn default_abilities() {
        let gate = Gate::default();
        let keys: Vec<_> = gate.abilities().collect();
        assert_eq!(keys.len(), ADMIN_ABILITIES.len());
        assert!(keys.contains(&"roles.manage"));
    }
}
