//! Plans the create/delete operations for one resource class.

use crate::owner;
use ahash::AHashSet as HashSet;
use rbac_controller_k8s_api::{
    rbac, ClusterRoleBinding, ObjectMeta, OwnerReference, RoleBinding, ServiceAccount,
};

pub(crate) trait ManagedResource: Clone {
    fn meta(&self) -> &ObjectMeta;

    /// Whether two objects name the same desired entry. Content changes
    /// outside the identity are realized as delete-then-create, never as an
    /// in-place update.
    fn identity_matches(&self, other: &Self) -> bool;
}

#[derive(Clone, Debug)]
pub(crate) struct Plan<T> {
    pub create: Vec<T>,
    pub delete: Vec<T>,
}

/// Classifies each desired object as existing or missing, and each existing
/// owned object as still-requested or orphaned. `existing` is expected to be
/// pre-filtered to the manager label; only objects whose owner-reference set
/// is exactly `[owner]` are ever planned for deletion.
pub(crate) fn plan<T: ManagedResource>(
    desired: &[T],
    existing: &[T],
    owner: &OwnerReference,
) -> Plan<T> {
    let mut matched = HashSet::new();
    let mut create = Vec::new();
    for requested in desired {
        match existing.iter().position(|e| e.identity_matches(requested)) {
            Some(i) => {
                matched.insert(i);
            }
            None => create.push(requested.clone()),
        }
    }

    let mut delete = Vec::new();
    for (i, obj) in existing.iter().enumerate() {
        if !matched.contains(&i) && owner::is_owned_by(obj.meta(), owner) {
            delete.push(obj.clone());
        }
    }

    Plan { create, delete }
}

impl ManagedResource for ServiceAccount {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    // Identity only: ServiceAccount content beyond (namespace, name) is
    // either immaterial or set by the API server.
    fn identity_matches(&self, other: &Self) -> bool {
        self.metadata.namespace == other.metadata.namespace
            && self.metadata.name == other.metadata.name
    }
}

impl ManagedResource for RoleBinding {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn identity_matches(&self, other: &Self) -> bool {
        self.metadata.namespace == other.metadata.namespace
            && self.metadata.name == other.metadata.name
            && self.role_ref == other.role_ref
            && subjects_match(self.subjects.as_deref(), other.subjects.as_deref())
    }
}

impl ManagedResource for ClusterRoleBinding {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn identity_matches(&self, other: &Self) -> bool {
        self.metadata.name == other.metadata.name
            && self.role_ref == other.role_ref
            && subjects_match(self.subjects.as_deref(), other.subjects.as_deref())
    }
}

/// Order-insensitive multiset equality over (kind, name, namespace). An
/// absent subject list and an empty one are equal; the API server normalizes
/// between the two.
fn subjects_match(a: Option<&[rbac::Subject]>, b: Option<&[rbac::Subject]>) -> bool {
    fn keys(subjects: Option<&[rbac::Subject]>) -> Vec<(&str, &str, Option<&str>)> {
        let mut keys = subjects
            .unwrap_or_default()
            .iter()
            .map(|s| (s.kind.as_str(), s.name.as_str(), s.namespace.as_deref()))
            .collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }
    keys(a) == keys(b)
}
