use crate::watches;
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use rbac_controller_k8s_api::{self as k8s, watcher};
use rbac_controller_k8s_reconcile::{
    manager_selector, KubeCluster, Metrics, Reconciler, ResourceKind,
};
use std::sync::Arc;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "rbac-controller",
    about = "Materializes RBACDefinitions into ServiceAccounts, RoleBindings, and ClusterRoleBindings",
    version
)]
pub struct Args {
    #[clap(
        long,
        default_value = "rbac_controller=info,warn",
        env = "RBAC_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = Metrics::register(prom.sub_registry_with_prefix("rbac_manager"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let reconciler = Arc::new(Reconciler::new(
            KubeCluster::new(runtime.client()),
            metrics,
        ));

        // Watches on managed classes are narrowed to the manager label; the
        // owner-reference check remains the authoritative ownership gate.
        let managed = || watcher::Config::default().labels(&manager_selector());

        let definitions = runtime.watch_all::<k8s::RBACDefinition>(watcher::Config::default());
        tokio::spawn(
            watches::definitions(reconciler.clone(), definitions)
                .instrument(info_span!("rbacdefinitions")),
        );

        let namespaces = runtime.watch_all::<k8s::Namespace>(watcher::Config::default());
        tokio::spawn(
            watches::namespaces(reconciler.clone(), namespaces).instrument(info_span!("namespaces")),
        );

        let service_accounts = runtime.watch_all::<k8s::ServiceAccount>(managed());
        tokio::spawn(
            watches::owned(
                reconciler.clone(),
                ResourceKind::ServiceAccounts,
                service_accounts,
            )
            .instrument(info_span!("serviceaccounts")),
        );

        let role_bindings = runtime.watch_all::<k8s::RoleBinding>(managed());
        tokio::spawn(
            watches::owned(reconciler.clone(), ResourceKind::RoleBindings, role_bindings)
                .instrument(info_span!("rolebindings")),
        );

        let cluster_role_bindings = runtime.watch_all::<k8s::ClusterRoleBinding>(managed());
        tokio::spawn(
            watches::owned(
                reconciler,
                ResourceKind::ClusterRoleBindings,
                cluster_role_bindings,
            )
            .instrument(info_span!("clusterrolebindings")),
        );

        if runtime.run().await.is_err() {
            bail!("aborted");
        }
        Ok(())
    }
}
