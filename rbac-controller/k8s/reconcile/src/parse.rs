//! Expands an RBACDefinition into the desired set of ServiceAccounts,
//! RoleBindings, and ClusterRoleBindings.

use crate::{manager_labels, owner};
use ahash::AHashSet as HashSet;
use rbac_controller_k8s_api::{
    labels::Selector, rbac, ClusterRoleBinding, Namespace, ObjectMeta, OwnerReference, RBACBinding,
    RBACDefinition, ResourceExt, RoleBinding, RoleRef, ServiceAccount, Subject, SubjectKind,
};
use thiserror::Error;

pub(crate) const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("RBACDefinition has no name or uid; generated objects cannot be owned")]
    UnidentifiedDefinition,

    #[error("duplicate rbacBinding name {0:?}")]
    DuplicateBindingName(String),

    #[error("rbacBinding {binding:?}: a roleBinding requires exactly one of `role` or `clusterRole`")]
    InvalidRoleRef { binding: String },

    #[error(
        "rbacBinding {binding:?}: a roleBinding requires exactly one of `namespace` or `namespaceSelector`"
    )]
    InvalidNamespaceScope { binding: String },

    #[error("rbacBinding {binding:?}: an empty namespaceSelector matches no namespaces")]
    EmptySelector { binding: String },

    #[error(
        "rbacBinding {binding:?}: ServiceAccount subject {subject:?} requires a namespace to be bound cluster-wide"
    )]
    ClusterSubjectWithoutNamespace { binding: String, subject: String },
}

/// The full set of objects a definition expands to, owner-stamped and
/// labeled, ready to be diffed against the cluster.
#[derive(Clone, Debug, Default)]
pub struct DesiredState {
    pub service_accounts: Vec<ServiceAccount>,
    pub role_bindings: Vec<RoleBinding>,
    pub cluster_role_bindings: Vec<ClusterRoleBinding>,
}

/// Expands `def` against the given live namespace list.
pub fn parse(def: &RBACDefinition, namespaces: &[Namespace]) -> Result<DesiredState, ParseError> {
    let parser = Parser::new(def, namespaces)?;
    Ok(DesiredState {
        service_accounts: parser.service_accounts()?,
        role_bindings: parser.role_bindings()?,
        cluster_role_bindings: parser.cluster_role_bindings()?,
    })
}

/// Narrow variant producing only RoleBindings; used when repairing
/// out-of-band RoleBinding edits.
pub(crate) fn parse_role_bindings(
    def: &RBACDefinition,
    namespaces: &[Namespace],
) -> Result<Vec<RoleBinding>, ParseError> {
    Parser::new(def, namespaces)?.role_bindings()
}

/// Narrow variant producing only ClusterRoleBindings. Independent of the
/// namespace population.
pub(crate) fn parse_cluster_role_bindings(
    def: &RBACDefinition,
) -> Result<Vec<ClusterRoleBinding>, ParseError> {
    Parser::new(def, &[])?.cluster_role_bindings()
}

/// Whether any roleBinding in the definition targets namespaces by label
/// selector. Gates the namespace-event reconcile path.
pub fn has_namespace_selectors(def: &RBACDefinition) -> bool {
    def.spec
        .rbac_bindings
        .iter()
        .flat_map(|b| b.role_bindings.iter())
        .any(|rb| rb.namespace_selector.is_some())
}

/// Resolves a selector against the live namespace list. Sorted and
/// deduplicated so that expansion is deterministic under arbitrary list
/// orders.
pub(crate) fn select_namespaces(selector: &Selector, namespaces: &[Namespace]) -> Vec<String> {
    let mut names = namespaces
        .iter()
        .filter(|ns| selector.matches(ns.labels()))
        .filter_map(|ns| ns.metadata.name.clone())
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    names
}

struct Parser<'a> {
    def: &'a RBACDefinition,
    def_name: &'a str,
    owner: OwnerReference,
    namespaces: &'a [Namespace],
}

/// A roleBindings entry after namespace resolution.
struct RoleBindingTarget {
    index: usize,
    role_ref: RoleRef,
    namespaces: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(def: &'a RBACDefinition, namespaces: &'a [Namespace]) -> Result<Self, ParseError> {
        let def_name = def
            .metadata
            .name
            .as_deref()
            .ok_or(ParseError::UnidentifiedDefinition)?;
        let owner = owner::owner_reference(def).ok_or(ParseError::UnidentifiedDefinition)?;

        let mut names = HashSet::new();
        for binding in &def.spec.rbac_bindings {
            if !names.insert(binding.name.as_str()) {
                return Err(ParseError::DuplicateBindingName(binding.name.clone()));
            }
        }

        Ok(Self {
            def,
            def_name,
            owner,
            namespaces,
        })
    }

    fn service_accounts(&self) -> Result<Vec<ServiceAccount>, ParseError> {
        let mut seen = HashSet::new();
        let mut accounts = Vec::new();
        for binding in &self.def.spec.rbac_bindings {
            let targets = self.expand_role_bindings(binding)?;
            for subject in &binding.subjects {
                if subject.kind != SubjectKind::ServiceAccount {
                    continue;
                }

                let namespaces = match &subject.namespace {
                    Some(ns) => vec![ns.clone()],
                    None => {
                        if !binding.cluster_role_bindings.is_empty() {
                            return Err(ParseError::ClusterSubjectWithoutNamespace {
                                binding: binding.name.clone(),
                                subject: subject.name.clone(),
                            });
                        }
                        // Inherit every namespace the binding's RoleBindings
                        // resolved to.
                        targets
                            .iter()
                            .flat_map(|t| t.namespaces.iter().cloned())
                            .collect()
                    }
                };

                for namespace in namespaces {
                    // First occurrence wins, including its automount flag.
                    if seen.insert((namespace.clone(), subject.name.clone())) {
                        accounts.push(ServiceAccount {
                            metadata: self
                                .object_meta(subject.name.clone(), Some(namespace)),
                            automount_service_account_token: subject
                                .automount_service_account_token,
                            ..ServiceAccount::default()
                        });
                    }
                }
            }
        }
        Ok(accounts)
    }

    fn role_bindings(&self) -> Result<Vec<RoleBinding>, ParseError> {
        let mut bindings = Vec::new();
        for binding in &self.def.spec.rbac_bindings {
            for target in self.expand_role_bindings(binding)? {
                for namespace in &target.namespaces {
                    let subjects = binding
                        .subjects
                        .iter()
                        .map(|s| rbac_subject(s, Some(namespace)))
                        .collect::<Vec<_>>();
                    bindings.push(RoleBinding {
                        metadata: self.object_meta(
                            object_name(self.def_name, &binding.name, target.index),
                            Some(namespace.clone()),
                        ),
                        role_ref: target.role_ref.clone(),
                        subjects: (!subjects.is_empty()).then_some(subjects),
                    });
                }
            }
        }
        Ok(bindings)
    }

    fn cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, ParseError> {
        let mut bindings = Vec::new();
        for binding in &self.def.spec.rbac_bindings {
            for (index, crb) in binding.cluster_role_bindings.iter().enumerate() {
                let mut subjects = Vec::with_capacity(binding.subjects.len());
                for subject in &binding.subjects {
                    if subject.kind == SubjectKind::ServiceAccount
                        && subject.namespace.is_none()
                    {
                        return Err(ParseError::ClusterSubjectWithoutNamespace {
                            binding: binding.name.clone(),
                            subject: subject.name.clone(),
                        });
                    }
                    subjects.push(rbac_subject(subject, None));
                }
                bindings.push(ClusterRoleBinding {
                    metadata: self
                        .object_meta(object_name(self.def_name, &binding.name, index), None),
                    role_ref: RoleRef {
                        api_group: RBAC_API_GROUP.to_string(),
                        kind: "ClusterRole".to_string(),
                        name: crb.cluster_role.clone(),
                    },
                    subjects: (!subjects.is_empty()).then_some(subjects),
                });
            }
        }
        Ok(bindings)
    }

    fn expand_role_bindings(
        &self,
        binding: &RBACBinding,
    ) -> Result<Vec<RoleBindingTarget>, ParseError> {
        let mut targets = Vec::with_capacity(binding.role_bindings.len());
        for (index, rb) in binding.role_bindings.iter().enumerate() {
            let role_ref = match (&rb.role, &rb.cluster_role) {
                (Some(role), None) => RoleRef {
                    api_group: RBAC_API_GROUP.to_string(),
                    kind: "Role".to_string(),
                    name: role.clone(),
                },
                (None, Some(cluster_role)) => RoleRef {
                    api_group: RBAC_API_GROUP.to_string(),
                    kind: "ClusterRole".to_string(),
                    name: cluster_role.clone(),
                },
                _ => {
                    return Err(ParseError::InvalidRoleRef {
                        binding: binding.name.clone(),
                    })
                }
            };

            let namespaces = match (&rb.namespace, &rb.namespace_selector) {
                (Some(namespace), None) => vec![namespace.clone()],
                (None, Some(selector)) => {
                    if selector.is_empty() {
                        return Err(ParseError::EmptySelector {
                            binding: binding.name.clone(),
                        });
                    }
                    select_namespaces(selector, self.namespaces)
                }
                _ => {
                    return Err(ParseError::InvalidNamespaceScope {
                        binding: binding.name.clone(),
                    })
                }
            };

            targets.push(RoleBindingTarget {
                index,
                role_ref,
                namespaces,
            });
        }
        Ok(targets)
    }

    fn object_meta(&self, name: String, namespace: Option<String>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name),
            namespace,
            labels: Some(manager_labels()),
            owner_references: Some(vec![self.owner.clone()]),
            ..ObjectMeta::default()
        }
    }
}

/// Entry 0 keeps the plain `<definition>-<binding>` name; later entries are
/// suffixed with their index so two specs in one binding cannot collide.
fn object_name(def: &str, binding: &str, index: usize) -> String {
    if index == 0 {
        format!("{}-{}", def, binding)
    } else {
        format!("{}-{}-{}", def, binding, index)
    }
}

fn rbac_subject(subject: &Subject, default_namespace: Option<&str>) -> rbac::Subject {
    let namespace = match subject.kind {
        SubjectKind::ServiceAccount => subject
            .namespace
            .clone()
            .or_else(|| default_namespace.map(Into::into)),
        SubjectKind::User | SubjectKind::Group => subject.namespace.clone(),
    };
    let api_group = match subject.kind {
        SubjectKind::ServiceAccount => None,
        SubjectKind::User | SubjectKind::Group => Some(RBAC_API_GROUP.to_string()),
    };
    rbac::Subject {
        api_group,
        kind: subject.kind.as_str().to_string(),
        name: subject.name.clone(),
        namespace,
    }
}
