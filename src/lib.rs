//! Schoolgate - role-based access control for a school admin back office
//!
//! Permissions are named keys (`users.edit`) grouped by module. A user holds
//! at most one role plus optional ad-hoc permissions; the gate allows an
//! action iff its key is in the union of the two. Destructive admin actions
//! additionally pass the protection rules in [`protected`].
//!
//! Everything is stored in one LMDB environment per [`Store`]. Each admin
//! action is a single write transaction, so checks and writes are atomic.
//!
//! ```no_run
//! use std::sync::Arc;
//! use schoolgate::{bootstrap, AdminService, Gate, RoleFilter, Store};
//!
//! let store = Arc::new(Store::open("schoolgate_data")?);
//! let registry = bootstrap::seed_catalog(&store)?;
//! let admin = bootstrap::bootstrap(&store, &bootstrap::BootstrapAdmin {
//!     name: "Admin".into(),
//!     email: "admin@example.com".into(),
//!     password_hash: "$2y$10$...".into(),
//! })?;
//!
//! let svc = AdminService::new(store, Gate::from_registry(&registry));
//! let roles = svc.list_roles(admin.id, &RoleFilter::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod admin;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gate;
pub mod logger;
pub mod models;
pub mod protected;
pub mod read;
pub mod registry;
pub mod resolve;
pub mod tx;
mod write;

// Re-exports
pub use admin::{AdminError, AdminResult, AdminService};
pub use config::Config;
pub use constants::*;
pub use db::Store;
pub use error::{GateError, Result};
pub use gate::{Decision, Gate};
pub use logger::init_logger;
pub use models::{
    NewRole, NewUser, Permission, Role, RoleDetail, RoleFilter, RoleRef, RoleSummary, RoleUpdate, Status, User,
    UserDetail, UserFilter, UserRef, UserSummary, UserUpdate,
};
pub use protected::{Action, Operation, Violation};
pub use read::RoleRecord;
pub use registry::PermissionRegistry;
pub use resolve::{effective_permissions, Subject};
pub use tx::{SyncChanges, Tx};
