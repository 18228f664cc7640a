//! Admin action tests: authorization, validation, CRUD and read projections

use std::sync::Arc;

use schoolgate::bootstrap::{self, BootstrapAdmin};
use schoolgate::{
    AdminError, AdminService, Gate, GateError, NewRole, NewUser, RoleFilter, RoleUpdate, Status, Store, UserFilter,
    UserUpdate,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    svc: AdminService,
    root: u64,
}

fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open_with(dir.path(), 64).unwrap());
    let registry = bootstrap::seed_catalog(&store).unwrap();
    let root = bootstrap::bootstrap(
        &store,
        &BootstrapAdmin { name: "Root".into(), email: "root@example.com".into(), password_hash: "hash".into() },
    )
    .unwrap()
    .id;
    Fixture { _dir: dir, svc: AdminService::new(store, Gate::from_registry(&registry)), root }
}

fn role_id(f: &Fixture, name: &str) -> u64 {
    f.svc.store().role_by_name(name).unwrap().unwrap().id
}

fn perm_ids(f: &Fixture, names: &[&str]) -> Vec<u64> {
    let reg = f.svc.store().registry().unwrap();
    names.iter().map(|n| reg.get(n).unwrap().id).collect()
}

fn new_user(email: &str, role_id: Option<u64>) -> NewUser {
    NewUser {
        name: format!("User {}", email),
        email: email.into(),
        phone: Some("555-0100".into()),
        password_hash: "hash".into(),
        role_id,
        is_active: None,
        additional_permissions: None,
    }
}

fn new_role(name: &str, permissions: Option<Vec<u64>>) -> NewRole {
    NewRole {
        name: name.into(),
        display_name: name.replace('_', " "),
        description: Some(format!("{} role", name)),
        is_active: None,
        permissions,
    }
}

// ============================================================================
// Bootstrap
// ============================================================================

#[test]
fn bootstrap_runs_once() {
    let f = setup();
    assert!(bootstrap::is_bootstrapped(f.svc.store()).unwrap());
    let again = bootstrap::bootstrap(
        f.svc.store(),
        &BootstrapAdmin { name: "Other".into(), email: "other@example.com".into(), password_hash: "h".into() },
    );
    assert!(matches!(again, Err(GateError::AlreadyBootstrapped)));
    assert!(f.svc.store().user_by_email("other@example.com").unwrap().is_none());
}

#[test]
fn seeding_is_idempotent() {
    let f = setup();
    let before = f.svc.store().registry().unwrap().len();
    let reg = bootstrap::seed_catalog(f.svc.store()).unwrap();
    assert_eq!(reg.len(), before);
    assert_eq!(reg.len(), 12);
    let roles = f.svc.list_roles(f.root, &RoleFilter::default()).unwrap();
    assert_eq!(roles.len(), 4);
}

#[test]
fn seeded_roles_have_expected_permissions() {
    let f = setup();
    let store = f.svc.store();
    let names = |r: &str| -> Vec<String> {
        store.role_permissions(role_id(&f, r)).unwrap().into_iter().map(|p| p.name).collect()
    };
    assert_eq!(names("super_admin").len(), 12);
    assert_eq!(names("student"), vec!["dashboard.view"]);
    assert!(names("school_admin").contains(&"users.activate".to_string()));
    assert!(!names("school_admin").contains(&"users.delete".to_string()));
    assert!(store.role_by_name("super_admin").unwrap().unwrap().is_system);
    assert!(!store.role_by_name("student").unwrap().unwrap().is_system);
}

// ============================================================================
// Authorization
// ============================================================================

#[test]
fn student_is_forbidden_everywhere() {
    let f = setup();
    let s = f.svc.create_user(f.root, &new_user("s@example.com", Some(role_id(&f, "student")))).unwrap().id;

    let forbidden = |r: Result<(), AdminError>, key: &str| match r {
        Err(AdminError::Forbidden { permission }) => assert_eq!(permission, key),
        other => panic!("expected forbidden for {}, got {:?}", key, other),
    };
    forbidden(f.svc.list_users(s, &UserFilter::default()).map(drop), "users.view");
    forbidden(f.svc.list_roles(s, &RoleFilter::default()).map(drop), "roles.view");
    forbidden(f.svc.create_user(s, &new_user("x@example.com", None)).map(drop), "users.create");
    forbidden(f.svc.delete_user(s, f.root), "users.delete");
    forbidden(f.svc.create_role(s, &new_role("tutor", None)).map(drop), "roles.create");
    forbidden(f.svc.delete_role(s, role_id(&f, "student")), "roles.delete");
}

#[test]
fn unknown_actor_is_forbidden() {
    let f = setup();
    assert!(matches!(f.svc.list_roles(9999, &RoleFilter::default()), Err(AdminError::Forbidden { .. })));
}

/// Additional permissions open exactly the matching actions
#[test]
fn additional_permission_opens_action() {
    let f = setup();
    let mut nu = new_user("s@example.com", Some(role_id(&f, "student")));
    nu.additional_permissions = Some(vec!["users.view".into()]);
    let s = f.svc.create_user(f.root, &nu).unwrap().id;

    assert_eq!(f.svc.list_users(s, &UserFilter::default()).unwrap().len(), 2);
    assert!(matches!(f.svc.show_role(s, 1), Err(AdminError::Forbidden { .. })));
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn create_show_update_delete_role() {
    let f = setup();
    let ids = perm_ids(&f, &["users.view", "dashboard.view"]);
    let role = f.svc.create_role(f.root, &new_role("tutor", Some(ids.clone()))).unwrap();
    assert!(role.is_active);
    assert!(!role.is_system);

    let detail = f.svc.show_role(f.root, role.id).unwrap();
    assert_eq!(detail.permissions.iter().map(|p| p.id).collect::<Vec<_>>(), ids);
    assert!(detail.users.is_empty());

    let update = RoleUpdate {
        name: "senior_tutor".into(),
        display_name: "Senior Tutor".into(),
        description: None,
        is_active: Some(false),
        permissions: Some(perm_ids(&f, &["users.edit"])),
    };
    let updated = f.svc.update_role(f.root, role.id, &update).unwrap();
    assert_eq!(updated.name, "senior_tutor");
    assert!(!updated.is_active);
    assert!(f.svc.store().has_permission(role.id, "users.edit").unwrap());
    assert!(!f.svc.store().has_permission(role.id, "users.view").unwrap());
    assert!(f.svc.store().role_by_name("tutor").unwrap().is_none());

    f.svc.delete_role(f.root, role.id).unwrap();
    assert!(matches!(
        f.svc.show_role(f.root, role.id),
        Err(AdminError::Gate(GateError::NotFound { kind: "role", .. }))
    ));
}

#[test]
fn update_without_permissions_clears_bindings() {
    let f = setup();
    let role = f.svc.create_role(f.root, &new_role("tutor", Some(perm_ids(&f, &["users.view"])))).unwrap();
    let update = RoleUpdate {
        name: "tutor".into(),
        display_name: "Tutor".into(),
        description: None,
        is_active: None,
        permissions: None,
    };
    f.svc.update_role(f.root, role.id, &update).unwrap();
    assert!(f.svc.store().role_permissions(role.id).unwrap().is_empty());
}

#[test]
fn role_validation() {
    let f = setup();
    assert!(matches!(f.svc.create_role(f.root, &new_role("Bad-Name", None)), Err(AdminError::Invalid(_))));

    let mut empty_display = new_role("tutor", None);
    empty_display.display_name.clear();
    assert!(matches!(f.svc.create_role(f.root, &empty_display), Err(AdminError::Invalid(_))));

    let mut long_desc = new_role("tutor", None);
    long_desc.description = Some("x".repeat(501));
    assert!(matches!(f.svc.create_role(f.root, &long_desc), Err(AdminError::Invalid(_))));

    assert!(matches!(
        f.svc.create_role(f.root, &new_role("tutor", Some(vec![9999]))),
        Err(AdminError::Gate(GateError::Validation(_)))
    ));
    assert!(f.svc.store().role_by_name("tutor").unwrap().is_none());
}

#[test]
fn duplicate_role_name() {
    let f = setup();
    assert!(matches!(
        f.svc.create_role(f.root, &new_role("student", None)),
        Err(AdminError::Gate(GateError::Duplicate(_)))
    ));
}

/// A new role with a reserved name is a system role
#[test]
fn reserved_name_marks_system_role() {
    let f = setup();
    let role = f.svc.create_role(f.root, &new_role("admin", None)).unwrap();
    assert!(role.is_system);
}

#[test]
fn list_roles_filters_and_counts() {
    let f = setup();
    f.svc.create_user(f.root, &new_user("s1@example.com", Some(role_id(&f, "student")))).unwrap();
    f.svc.create_user(f.root, &new_user("s2@example.com", Some(role_id(&f, "student")))).unwrap();
    f.svc.toggle_role_status(f.root, role_id(&f, "international_school")).unwrap();

    let all = f.svc.list_roles(f.root, &RoleFilter::default()).unwrap();
    let ids: Vec<u64> = all.iter().map(|r| r.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(ids, sorted, "newest first");

    let student = all.iter().find(|r| r.name == "student").unwrap();
    assert_eq!(student.users_count, 2);
    assert_eq!(student.permissions_count, 1);

    let inactive = f
        .svc
        .list_roles(f.root, &RoleFilter { search: None, status: Some(Status::Inactive) })
        .unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].name, "international_school");

    let found = f
        .svc
        .list_roles(f.root, &RoleFilter { search: Some("SCHOOL".into()), status: Some(Status::Active) })
        .unwrap();
    assert_eq!(found.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["school_admin"]);
}

#[test]
fn catalog_grouped_by_module() {
    let f = setup();
    let catalog = f.svc.permission_catalog(f.root).unwrap();
    let modules: Vec<&str> = catalog.list_all().keys().map(String::as_str).collect();
    assert_eq!(modules, vec!["dashboard", "roles", "system", "users"]);
    assert_eq!(catalog.list_all()["users"].len(), 5);
}

// ============================================================================
// Users
// ============================================================================

#[test]
fn create_update_delete_user() {
    let f = setup();
    let student = role_id(&f, "student");
    let created = f.svc.create_user(f.root, &new_user("ana@example.com", Some(student))).unwrap();
    assert!(created.is_active);
    assert_eq!(created.role.as_ref().map(|r| r.name.as_str()), Some("student"));

    let update = UserUpdate {
        name: "Ana".into(),
        email: "ana.b@example.com".into(),
        phone: None,
        password_hash: None,
        role_id: Some(role_id(&f, "school_admin")),
        is_active: None,
        additional_permissions: Some(vec!["roles.view".into()]),
    };
    let updated = f.svc.update_user(f.root, created.id, &update).unwrap();
    assert_eq!(updated.email, "ana.b@example.com");
    assert_eq!(updated.additional_permissions, vec!["roles.view"]);
    assert_eq!(f.svc.store().users_count(student).unwrap(), 0);
    assert!(f.svc.store().user_by_email("ana@example.com").unwrap().is_none());

    let stored = f.svc.store().user(created.id).unwrap().unwrap();
    assert_eq!(stored.password_hash, "hash");

    f.svc.delete_user(f.root, created.id).unwrap();
    assert!(f.svc.store().user(created.id).unwrap().is_none());
    assert_eq!(f.svc.store().users_count(role_id(&f, "school_admin")).unwrap(), 0);
}

#[test]
fn password_hash_replaced_when_present() {
    let f = setup();
    let u = f.svc.create_user(f.root, &new_user("ana@example.com", None)).unwrap();
    let update = UserUpdate {
        name: u.name.clone(),
        email: u.email.clone(),
        phone: None,
        password_hash: Some("new-hash".into()),
        role_id: None,
        is_active: None,
        additional_permissions: None,
    };
    f.svc.update_user(f.root, u.id, &update).unwrap();
    assert_eq!(f.svc.store().user(u.id).unwrap().unwrap().password_hash, "new-hash");
}

#[test]
fn user_validation() {
    let f = setup();
    let mut bad = new_user("not-an-email", None);
    bad.phone = Some("1".repeat(21));
    match f.svc.create_user(f.root, &bad) {
        Err(AdminError::Invalid(errs)) => {
            assert!(errs.field_errors().contains_key("email"));
            assert!(errs.field_errors().contains_key("phone"));
        }
        other => panic!("expected invalid, got {:?}", other),
    }

    assert!(matches!(
        f.svc.create_user(f.root, &new_user("x@example.com", Some(9999))),
        Err(AdminError::Gate(GateError::Validation(_)))
    ));

    let mut unknown = new_user("y@example.com", None);
    unknown.additional_permissions = Some(vec!["reports.export".into()]);
    assert!(matches!(f.svc.create_user(f.root, &unknown), Err(AdminError::Gate(GateError::Validation(_)))));
}

#[test]
fn duplicate_email() {
    let f = setup();
    assert!(matches!(
        f.svc.create_user(f.root, &new_user("root@example.com", None)),
        Err(AdminError::Gate(GateError::Duplicate(_)))
    ));
}

#[test]
fn list_users_filters() {
    let f = setup();
    let student = role_id(&f, "student");
    let a = f.svc.create_user(f.root, &new_user("alice@example.com", Some(student))).unwrap();
    f.svc.create_user(f.root, &new_user("bob@example.com", Some(student))).unwrap();
    f.svc.create_user(f.root, &new_user("carol@example.com", None)).unwrap();
    f.svc.toggle_user_status(f.root, a.id).unwrap();

    let all = f.svc.list_users(f.root, &UserFilter::default()).unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].email, "carol@example.com");

    let students = f
        .svc
        .list_users(f.root, &UserFilter { search: None, role: Some("student".into()), status: None })
        .unwrap();
    assert_eq!(students.len(), 2);

    let active_students = f
        .svc
        .list_users(f.root, &UserFilter { search: None, role: Some("student".into()), status: Some(Status::Active) })
        .unwrap();
    assert_eq!(active_students.len(), 1);
    assert_eq!(active_students[0].email, "bob@example.com");

    let by_search = f
        .svc
        .list_users(f.root, &UserFilter { search: Some("ALICE".into()), role: None, status: None })
        .unwrap();
    assert_eq!(by_search.len(), 1);
    assert!(!by_search[0].is_active);
}

#[test]
fn show_user_includes_role() {
    let f = setup();
    let detail = f.svc.show_user(f.root, f.root).unwrap();
    assert_eq!(detail.email, "root@example.com");
    assert_eq!(detail.role.map(|r| r.name), Some("super_admin".to_string()));
    assert!(detail.last_login_at.is_none());
}

#[test]
fn record_login_stamps_time() {
    let f = setup();
    let user = f.svc.record_login(f.root).unwrap();
    assert!(user.last_login_at.is_some());
    assert!(f.svc.show_user(f.root, f.root).unwrap().last_login_at.is_some());
    assert!(matches!(f.svc.record_login(9999), Err(AdminError::Gate(GateError::NotFound { .. }))));
}
