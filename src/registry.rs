//! Permission registry: the catalog of permission keys grouped by module

use std::collections::{BTreeMap, BTreeSet};

use crate::db::Store;
use crate::error::Result;
use crate::models::Permission;
use crate::read;

/// Snapshot of the permission catalog
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    by_module: BTreeMap<String, Vec<Permission>>,
    names: BTreeSet<String>,
}

impl PermissionRegistry {
    pub fn from_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut reg = PermissionRegistry::default();
        for p in permissions {
            if !reg.names.insert(p.name.clone()) {
                tracing::debug!(name = %p.name, "Skipping duplicate permission name");
                continue;
            }
            reg.by_module.entry(p.module.clone()).or_default().push(p);
        }
        reg
    }

    /// All permissions grouped by module
    pub fn list_all(&self) -> &BTreeMap<String, Vec<Permission>> {
        &self.by_module
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&Permission> {
        self.by_module.values().flatten().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Store {
    /// Load the catalog from a committed snapshot
    pub fn registry(&self) -> Result<PermissionRegistry> {
        self.read(|d, tx| Ok(PermissionRegistry::from_permissions(read::all_permissions(d, tx)?)))
    }
}
