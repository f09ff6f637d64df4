//! Serialized reconciliation entry points.

use crate::{
    cluster::Cluster,
    diff::{self, Plan},
    metrics::{Metrics, ResourceKind},
    owner,
    parse::{self, ParseError},
};
use rbac_controller_k8s_api::{
    ClusterRoleBinding, Namespace, OwnerReference, RBACDefinition, Resource, ResourceExt,
    RoleBinding, ServiceAccount,
};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid RBACDefinition: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Api(#[from] rbac_controller_k8s_api::Error),
}

/// Drives the cluster's ServiceAccounts, RoleBindings, and
/// ClusterRoleBindings toward the state declared by RBACDefinitions.
///
/// Every entry point serializes on one lock held for its whole body: no two
/// reconciles ever observe interleaved API states, at the cost of running
/// one reconcile at a time.
pub struct Reconciler<C> {
    cluster: C,
    metrics: Metrics,
    lock: Mutex<()>,
}

impl<C> Reconciler<C> {
    pub fn new(cluster: C, metrics: Metrics) -> Self {
        Self {
            cluster,
            metrics,
            lock: Mutex::new(()),
        }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }
}

impl<C: Cluster> Reconciler<C> {
    /// Full reconcile of one definition; run when a definition is added or
    /// modified. Classes are applied ServiceAccount, then
    /// ClusterRoleBinding, then RoleBinding, so a RoleBinding referencing a
    /// generated ServiceAccount finds it already present.
    pub async fn reconcile(&self, def: &RBACDefinition) -> Result<(), Error> {
        let _serialized = self.lock.lock().await;
        tracing::info!(definition = %def.name_any(), "Reconciling RBACDefinition");

        let owner = owner_of(def)?;
        let namespaces = self.namespaces().await?;
        let desired = parse::parse(def, &namespaces)?;

        self.apply_service_accounts(desired.service_accounts, &owner)
            .await?;
        self.apply_cluster_role_bindings(desired.cluster_role_bindings, &owner)
            .await?;
        self.apply_role_bindings(desired.role_bindings, &owner)
            .await?;
        Ok(())
    }

    /// Re-reconciles the namespace-dependent portion of a definition after a
    /// namespace was added, relabeled, or deleted. The `namespace` argument
    /// is informational; the parse re-enumerates every matching namespace.
    /// ClusterRoleBindings are skipped: they do not depend on the namespace
    /// population.
    pub async fn reconcile_namespace_change(
        &self,
        def: &RBACDefinition,
        namespace: &str,
    ) -> Result<(), Error> {
        let _serialized = self.lock.lock().await;
        tracing::info!(
            definition = %def.name_any(),
            %namespace,
            "Reconciling RBACDefinition for namespace change"
        );

        let owner = owner_of(def)?;
        let namespaces = self.namespaces().await?;
        let desired = parse::parse(def, &namespaces)?;

        self.apply_service_accounts(desired.service_accounts, &owner)
            .await?;
        self.apply_role_bindings(desired.role_bindings, &owner)
            .await?;
        Ok(())
    }

    /// Repairs a definition after one of its generated objects was modified
    /// or deleted out of band. Only the touched resource class is
    /// re-applied, except ServiceAccounts, whose synthesis depends on every
    /// binding and therefore runs a full parse. A definition that no longer
    /// exists is skipped: owner-reference garbage collection removes its
    /// children.
    pub async fn reconcile_owners(
        &self,
        owner_refs: &[OwnerReference],
        kind: ResourceKind,
    ) -> Result<(), Error> {
        let _serialized = self.lock.lock().await;

        let namespaces = self.namespaces().await?;
        for reference in owner_refs {
            if reference.kind != RBACDefinition::kind(&()).as_ref() {
                continue;
            }
            let Some(def) = self.cluster.get_rbac_definition(&reference.name).await? else {
                tracing::debug!(definition = %reference.name, "RBACDefinition not found, skipping");
                continue;
            };
            tracing::debug!(definition = %def.name_any(), %kind, "Reconciling owner");

            let owner = owner_of(&def)?;
            match kind {
                ResourceKind::ServiceAccounts => {
                    let desired = parse::parse(&def, &namespaces)?;
                    self.apply_service_accounts(desired.service_accounts, &owner)
                        .await?;
                }
                ResourceKind::RoleBindings => {
                    let desired = parse::parse_role_bindings(&def, &namespaces)?;
                    self.apply_role_bindings(desired, &owner).await?;
                }
                ResourceKind::ClusterRoleBindings => {
                    let desired = parse::parse_cluster_role_bindings(&def)?;
                    self.apply_cluster_role_bindings(desired, &owner).await?;
                }
            }
        }
        Ok(())
    }

    async fn namespaces(&self) -> Result<Vec<Namespace>, Error> {
        match self.cluster.list_namespaces().await {
            Ok(namespaces) => Ok(namespaces),
            Err(error) => {
                self.metrics.incr_error();
                Err(error.into())
            }
        }
    }

    async fn apply_service_accounts(
        &self,
        desired: Vec<ServiceAccount>,
        owner: &OwnerReference,
    ) -> Result<(), Error> {
        let existing = match self.cluster.list_service_accounts().await {
            Ok(existing) => existing,
            Err(error) => {
                self.metrics.incr_error();
                return Err(error.into());
            }
        };
        let Plan { create, delete } = diff::plan(&desired, &existing, owner);

        for sa in delete {
            let namespace = sa.metadata.namespace.clone().unwrap_or_default();
            let name = sa.name_any();
            tracing::info!(%namespace, %name, "Deleting ServiceAccount");
            match self.cluster.delete_service_account(&namespace, &name).await {
                Ok(()) => self.metrics.incr_deleted(ResourceKind::ServiceAccounts),
                Err(error) => {
                    tracing::error!(%namespace, %name, %error, "Error deleting ServiceAccount");
                    self.metrics.incr_error();
                }
            }
        }

        for sa in create {
            let namespace = sa.metadata.namespace.clone().unwrap_or_default();
            let name = sa.name_any();
            tracing::info!(%namespace, %name, "Creating ServiceAccount");
            match self.cluster.create_service_account(&sa).await {
                Ok(()) => self.metrics.incr_created(ResourceKind::ServiceAccounts),
                Err(error) => {
                    tracing::error!(%namespace, %name, %error, "Error creating ServiceAccount");
                    self.metrics.incr_error();
                }
            }
        }
        Ok(())
    }

    async fn apply_role_bindings(
        &self,
        desired: Vec<RoleBinding>,
        owner: &OwnerReference,
    ) -> Result<(), Error> {
        let existing = match self.cluster.list_role_bindings().await {
            Ok(existing) => existing,
            Err(error) => {
                self.metrics.incr_error();
                return Err(error.into());
            }
        };
        let Plan { create, delete } = diff::plan(&desired, &existing, owner);

        for rb in delete {
            let namespace = rb.metadata.namespace.clone().unwrap_or_default();
            let name = rb.name_any();
            tracing::info!(%namespace, %name, "Deleting RoleBinding");
            match self.cluster.delete_role_binding(&namespace, &name).await {
                Ok(()) => self.metrics.incr_deleted(ResourceKind::RoleBindings),
                Err(error) => {
                    tracing::error!(%namespace, %name, %error, "Error deleting RoleBinding");
                    self.metrics.incr_error();
                }
            }
        }

        for rb in create {
            let namespace = rb.metadata.namespace.clone().unwrap_or_default();
            let name = rb.name_any();
            tracing::info!(%namespace, %name, "Creating RoleBinding");
            match self.cluster.create_role_binding(&rb).await {
                Ok(()) => self.metrics.incr_created(ResourceKind::RoleBindings),
                Err(error) => {
                    tracing::error!(%namespace, %name, %error, "Error creating RoleBinding");
                    self.metrics.incr_error();
                }
            }
        }
        Ok(())
    }

    async fn apply_cluster_role_bindings(
        &self,
        desired: Vec<ClusterRoleBinding>,
        owner: &OwnerReference,
    ) -> Result<(), Error> {
        let existing = match self.cluster.list_cluster_role_bindings().await {
            Ok(existing) => existing,
            Err(error) => {
                self.metrics.incr_error();
                return Err(error.into());
            }
        };
        let Plan { create, delete } = diff::plan(&desired, &existing, owner);

        for crb in delete {
            let name = crb.name_any();
            tracing::info!(%name, "Deleting ClusterRoleBinding");
            match self.cluster.delete_cluster_role_binding(&name).await {
                Ok(()) => self.metrics.incr_deleted(ResourceKind::ClusterRoleBindings),
                Err(error) => {
                    tracing::error!(%name, %error, "Error deleting ClusterRoleBinding");
                    self.metrics.incr_error();
                }
            }
        }

        for crb in create {
            let name = crb.name_any();
            tracing::info!(%name, "Creating ClusterRoleBinding");
            match self.cluster.create_cluster_role_binding(&crb).await {
                Ok(()) => self.metrics.incr_created(ResourceKind::ClusterRoleBindings),
                Err(error) => {
                    tracing::error!(%name, %error, "Error creating ClusterRoleBinding");
                    self.metrics.incr_error();
                }
            }
        }
        Ok(())
    }
}

fn owner_of(def: &RBACDefinition) -> Result<OwnerReference, Error> {
    owner::owner_reference(def)
        .ok_or(ParseError::UnidentifiedDefinition)
        .map_err(Error::from)
}
