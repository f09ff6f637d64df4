//! The Kubernetes API surface the reconciler consumes.

use crate::manager_selector;
use async_trait::async_trait;
use rbac_controller_k8s_api::{
    Api, Client, ClusterRoleBinding, DeleteParams, Error, ListParams, Namespace, PostParams,
    RBACDefinition, RoleBinding, ServiceAccount,
};

/// Cluster operations used by the reconciler. Lists of managed classes are
/// filtered to the manager label; the namespace list is unfiltered.
///
/// Implemented for a live [`Client`] by [`KubeCluster`] and by an in-memory
/// fake in the test suite.
#[async_trait]
pub trait Cluster: Send + Sync + 'static {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, Error>;

    async fn list_rbac_definitions(&self) -> Result<Vec<RBACDefinition>, Error>;
    async fn get_rbac_definition(&self, name: &str) -> Result<Option<RBACDefinition>, Error>;

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, Error>;
    async fn create_service_account(&self, sa: &ServiceAccount) -> Result<(), Error>;
    async fn delete_service_account(&self, namespace: &str, name: &str) -> Result<(), Error>;

    async fn list_role_bindings(&self) -> Result<Vec<RoleBinding>, Error>;
    async fn create_role_binding(&self, rb: &RoleBinding) -> Result<(), Error>;
    async fn delete_role_binding(&self, namespace: &str, name: &str) -> Result<(), Error>;

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, Error>;
    async fn create_cluster_role_binding(&self, crb: &ClusterRoleBinding) -> Result<(), Error>;
    async fn delete_cluster_role_binding(&self, name: &str) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn managed(&self) -> ListParams {
        ListParams::default().labels(&manager_selector())
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, Error> {
        let api = Api::<Namespace>::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_rbac_definitions(&self) -> Result<Vec<RBACDefinition>, Error> {
        let api = Api::<RBACDefinition>::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_rbac_definition(&self, name: &str) -> Result<Option<RBACDefinition>, Error> {
        let api = Api::<RBACDefinition>::all(self.client.clone());
        api.get_opt(name).await
    }

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, Error> {
        let api = Api::<ServiceAccount>::all(self.client.clone());
        Ok(api.list(&self.managed()).await?.items)
    }

    async fn create_service_account(&self, sa: &ServiceAccount) -> Result<(), Error> {
        let namespace = sa.metadata.namespace.as_deref().unwrap_or_default();
        let api = Api::<ServiceAccount>::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), sa).await.map(|_| ())
    }

    async fn delete_service_account(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api = Api::<ServiceAccount>::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await.map(|_| ())
    }

    async fn list_role_bindings(&self) -> Result<Vec<RoleBinding>, Error> {
        let api = Api::<RoleBinding>::all(self.client.clone());
        Ok(api.list(&self.managed()).await?.items)
    }

    async fn create_role_binding(&self, rb: &RoleBinding) -> Result<(), Error> {
        let namespace = rb.metadata.namespace.as_deref().unwrap_or_default();
        let api = Api::<RoleBinding>::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), rb).await.map(|_| ())
    }

    async fn delete_role_binding(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api = Api::<RoleBinding>::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await.map(|_| ())
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, Error> {
        let api = Api::<ClusterRoleBinding>::all(self.client.clone());
        Ok(api.list(&self.managed()).await?.items)
    }

    async fn create_cluster_role_binding(&self, crb: &ClusterRoleBinding) -> Result<(), Error> {
        let api = Api::<ClusterRoleBinding>::all(self.client.clone());
        api.create(&PostParams::default(), crb).await.map(|_| ())
    }

    async fn delete_cluster_role_binding(&self, name: &str) -> Result<(), Error> {
        let api = Api::<ClusterRoleBinding>::all(self.client.clone());
        api.delete(name, &DeleteParams::default()).await.map(|_| ())
    }
}
