use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue, LabelValueEncoder},
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::fmt::Write;

/// Counters describing the controller's effect on the cluster. Exposed as
/// `rbac_manager_errors_total` and
/// `rbac_manager_changes_total{resource, action}` when registered under a
/// `rbac_manager` prefix.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    errors: Counter,
    changes: Family<ChangeLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ChangeLabels {
    resource: ResourceKind,
    action: Action,
}

/// One of the three managed resource classes.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum ResourceKind {
    ServiceAccounts,
    RoleBindings,
    ClusterRoleBindings,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
enum Action {
    Create,
    Delete,
}

impl Metrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "errors",
            "Count of Kubernetes API errors",
            metrics.errors.clone(),
        );
        prom.register(
            "changes",
            "Count of create and delete operations issued against the cluster",
            metrics.changes.clone(),
        );
        metrics
    }

    pub(crate) fn incr_error(&self) {
        self.errors.inc();
    }

    pub(crate) fn incr_created(&self, resource: ResourceKind) {
        self.changes
            .get_or_create(&ChangeLabels {
                resource,
                action: Action::Create,
            })
            .inc();
    }

    pub(crate) fn incr_deleted(&self, resource: ResourceKind) {
        self.changes
            .get_or_create(&ChangeLabels {
                resource,
                action: Action::Delete,
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn errors_count(&self) -> u64 {
        self.errors.get()
    }

    #[cfg(test)]
    pub(crate) fn created_count(&self, resource: ResourceKind) -> u64 {
        self.changes
            .get_or_create(&ChangeLabels {
                resource,
                action: Action::Create,
            })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn deleted_count(&self, resource: ResourceKind) -> u64 {
        self.changes
            .get_or_create(&ChangeLabels {
                resource,
                action: Action::Delete,
            })
            .get()
    }
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAccounts => "serviceaccounts",
            Self::RoleBindings => "rolebindings",
            Self::ClusterRoleBindings => "clusterrolebindings",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EncodeLabelValue for ResourceKind {
    fn encode(&self, encoder: &mut LabelValueEncoder<'_>) -> std::fmt::Result {
        encoder.write_str(self.as_str())
    }
}

impl EncodeLabelValue for Action {
    fn encode(&self, encoder: &mut LabelValueEncoder<'_>) -> std::fmt::Result {
        encoder.write_str(match self {
            Self::Create => "create",
            Self::Delete => "delete",
        })
    }
}
