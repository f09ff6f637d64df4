use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declares a desired access-control state: a set of named bindings, each
/// granting a role to a list of subjects, cluster-wide or in one or more
/// namespaces. The controller materializes each definition into
/// ServiceAccounts, RoleBindings, and ClusterRoleBindings.
#[derive(Clone, Debug, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(group = "rbacmanager.io", version = "v1beta1", kind = "RBACDefinition")]
#[serde(rename_all = "camelCase")]
pub struct RBACDefinitionSpec {
    #[serde(default)]
    pub rbac_bindings: Vec<RBACBinding>,
}

/// One entry of an RBACDefinition. Yields zero or more ClusterRoleBindings
/// and zero or more RoleBindings, each carrying this entry's subjects.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RBACBinding {
    /// Unique within the definition; generated objects are named
    /// `<definition>-<binding>`.
    pub name: String,

    #[serde(default)]
    pub subjects: Vec<Subject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_role_bindings: Vec<ClusterRoleBindingSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_bindings: Vec<RoleBindingSpec>,
}

/// An identity a role is granted to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub kind: SubjectKind,

    pub name: String,

    /// Required for ServiceAccount subjects of a clusterRoleBinding. In a
    /// roleBinding, a ServiceAccount subject without a namespace is placed
    /// in the binding's target namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// ServiceAccount subjects only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automount_service_account_token: Option<bool>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SubjectKind {
    ServiceAccount,
    User,
    Group,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAccount => "ServiceAccount",
            Self::User => "User",
            Self::Group => "Group",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleBindingSpec {
    pub cluster_role: String,
}

/// Grants a role in a single namespace or in every namespace matched by a
/// label selector. Exactly one of `role`/`cluster_role` and exactly one of
/// `namespace`/`namespace_selector` must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleBindingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<labels::Selector>,
}
