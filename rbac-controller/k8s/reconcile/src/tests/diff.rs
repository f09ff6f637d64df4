use crate::diff;
use crate::owner;
use crate::tests::make_definition;
use rbac_controller_k8s_api::{rbac, ObjectMeta, OwnerReference, RoleBinding, RoleRef};

fn test_owner() -> OwnerReference {
    owner::owner_reference(&make_definition("example", vec![])).unwrap()
}

fn subject(kind: &str, name: &str, namespace: Option<&str>) -> rbac::Subject {
    rbac::Subject {
        api_group: None,
        kind: kind.to_string(),
        name: name.to_string(),
        namespace: namespace.map(Into::into),
    }
}

fn role_binding(
    namespace: &str,
    name: &str,
    role: &str,
    subjects: Vec<rbac::Subject>,
    owner: Option<&OwnerReference>,
) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: owner.map(|o| vec![o.clone()]),
            ..ObjectMeta::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: role.to_string(),
        },
        subjects: (!subjects.is_empty()).then_some(subjects),
    }
}

#[test]
fn matching_existing_object_is_retained() {
    let owner = test_owner();
    let desired = vec![role_binding("foo", "example-bind1", "reader", vec![], None)];
    let existing = vec![role_binding(
        "foo",
        "example-bind1",
        "reader",
        vec![],
        Some(&owner),
    )];

    let plan = diff::plan(&desired, &existing, &owner);
    assert!(plan.create.is_empty());
    assert!(plan.delete.is_empty());
}

#[test]
fn subject_order_does_not_matter() {
    let owner = test_owner();
    let x = subject("User", "x", None);
    let y = subject("User", "y", None);
    let desired = vec![role_binding(
        "foo",
        "example-bind1",
        "reader",
        vec![x.clone(), y.clone()],
        None,
    )];
    let existing = vec![role_binding(
        "foo",
        "example-bind1",
        "reader",
        vec![y, x],
        Some(&owner),
    )];

    let plan = diff::plan(&desired, &existing, &owner);
    assert!(plan.create.is_empty());
    assert!(plan.delete.is_empty());
}

#[test]
fn subject_content_does_matter() {
    let owner = test_owner();
    let desired = vec![role_binding(
        "foo",
        "example-bind1",
        "reader",
        vec![subject("User", "x", None)],
        None,
    )];
    let existing = vec![role_binding(
        "foo",
        "example-bind1",
        "reader",
        vec![subject("User", "y", None)],
        Some(&owner),
    )];

    let plan = diff::plan(&desired, &existing, &owner);
    assert_eq!(plan.create.len(), 1);
    assert_eq!(plan.delete.len(), 1);
}

#[test]
fn role_change_plans_delete_and_create() {
    let owner = test_owner();
    let desired = vec![role_binding("foo", "example-bind1", "writer", vec![], None)];
    let existing = vec![role_binding(
        "foo",
        "example-bind1",
        "reader",
        vec![],
        Some(&owner),
    )];

    let plan = diff::plan(&desired, &existing, &owner);
    assert_eq!(plan.create.len(), 1);
    assert_eq!(plan.create[0].role_ref.name, "writer");
    assert_eq!(plan.delete.len(), 1);
    assert_eq!(plan.delete[0].role_ref.name, "reader");
}

#[test]
fn owned_orphan_is_deleted() {
    let owner = test_owner();
    let existing = vec![role_binding(
        "foo",
        "example-old",
        "reader",
        vec![],
        Some(&owner),
    )];

    let plan = diff::plan(&[], &existing, &owner);
    assert!(plan.create.is_empty());
    assert_eq!(plan.delete.len(), 1);
}

#[test]
fn unowned_orphan_is_invisible() {
    let owner = test_owner();
    let existing = vec![role_binding("foo", "example-old", "reader", vec![], None)];

    let plan = diff::plan(&[], &existing, &owner);
    assert!(plan.delete.is_empty());
}

#[test]
fn shared_ownership_is_not_ownership() {
    let owner = test_owner();
    let mut rb = role_binding("foo", "example-old", "reader", vec![], Some(&owner));
    let other = OwnerReference {
        name: "another-controller".to_string(),
        uid: "another-uid".to_string(),
        ..owner.clone()
    };
    rb.metadata
        .owner_references
        .as_mut()
        .unwrap()
        .push(other);

    let plan = diff::plan(&[], &[rb], &owner);
    assert!(plan.delete.is_empty());
}

#[test]
fn foreign_owner_is_not_ownership() {
    let owner = test_owner();
    let foreign = owner::owner_reference(&make_definition("other", vec![])).unwrap();
    let existing = vec![role_binding(
        "foo",
        "example-old",
        "reader",
        vec![],
        Some(&foreign),
    )];

    let plan = diff::plan(&[], &existing, &owner);
    assert!(plan.delete.is_empty());
}
