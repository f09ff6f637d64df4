#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cluster;
mod diff;
mod metrics;
mod owner;
mod parse;
mod reconciler;


pub use self::cluster::{Cluster, KubeCluster};
pub use self::metrics::{Metrics, ResourceKind};
pub use self::parse::{has_namespace_selectors, DesiredState, ParseError};
pub use self::reconciler::{Error, Reconciler};

/// Label borne by every object this controller generates. List calls filter
/// on it so that API-server load is proportional to the managed set, not to
/// the whole cluster; owner-reference equality remains the authoritative
/// ownership gate.
pub const MANAGER_LABEL: &str = "rbac-manager";

/// Value of [`MANAGER_LABEL`] on managed objects.
pub const MANAGER: &str = "rbac-controller";

/// The label selector used when listing potentially-managed objects.
pub fn manager_selector() -> String {
    format!("{}={}", MANAGER_LABEL, MANAGER)
}

pub(crate) fn manager_labels() -> std::collections::BTreeMap<String, String> {
    std::iter::once((MANAGER_LABEL.to_string(), MANAGER.to_string())).collect()
}
