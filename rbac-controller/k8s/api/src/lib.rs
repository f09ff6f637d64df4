#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
mod rbac_definition;

pub use self::labels::Selector;
pub use self::rbac_definition::{
    ClusterRoleBindingSpec, RBACBinding, RBACDefinition, RBACDefinitionSpec, RoleBindingSpec,
    Subject, SubjectKind,
};
pub use k8s_openapi::{
    api::{
        core::v1::{Namespace, ServiceAccount},
        rbac::v1::{self as rbac, ClusterRoleBinding, RoleBinding, RoleRef},
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams, Resource, ResourceExt},
    error::ErrorResponse,
    runtime::watcher,
    Client, Error,
};
