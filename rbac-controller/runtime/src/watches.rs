//! Translates watch events into reconciler calls.

use futures::prelude::*;
use rbac_controller_k8s_api::{
    watcher::Event, Namespace, OwnerReference, RBACDefinition, ResourceExt,
};
use rbac_controller_k8s_reconcile::{has_namespace_selectors, Cluster, Reconciler, ResourceKind};
use std::sync::Arc;

/// Applies RBACDefinition events. Every added or modified definition is
/// reconciled in full; the initial listing and watch re-establishments
/// reconcile everything. Deletions need no action, the API server's garbage
/// collector removes owned children.
pub(crate) async fn definitions<C, S>(reconciler: Arc<Reconciler<C>>, events: S)
where
    C: Cluster,
    S: Stream<Item = Event<RBACDefinition>>,
{
    tokio::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            Event::Applied(def) => reconcile(&reconciler, &def).await,
            Event::Restarted(defs) => {
                for def in &defs {
                    reconcile(&reconciler, def).await;
                }
            }
            Event::Deleted(_) => {}
        }
    }
}

/// Applies Namespace events. Any change to the namespace population may
/// change the expansion of selector-scoped bindings, so every definition
/// that uses a selector is re-reconciled.
pub(crate) async fn namespaces<C, S>(reconciler: Arc<Reconciler<C>>, events: S)
where
    C: Cluster,
    S: Stream<Item = Event<Namespace>>,
{
    tokio::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            Event::Applied(ns) | Event::Deleted(ns) => {
                namespace_change(&reconciler, &ns.name_any()).await;
            }
            Event::Restarted(_) => {
                // The watch was re-established; namespace changes may have
                // been missed, so run a full pass over selector users.
                resync_selector_users(&reconciler).await;
            }
        }
    }
}

/// Applies events for managed objects: a modification or deletion of an
/// object owned by an RBACDefinition triggers a reconcile of the touched
/// resource class for that definition. The initial listing is ignored;
/// additions originate from this controller.
pub(crate) async fn owned<C, S, T>(reconciler: Arc<Reconciler<C>>, kind: ResourceKind, events: S)
where
    C: Cluster,
    S: Stream<Item = Event<T>>,
    T: ResourceExt,
{
    tokio::pin!(events);
    while let Some(event) = events.next().await {
        let refs: Vec<OwnerReference> = match event {
            Event::Applied(obj) | Event::Deleted(obj) => obj.owner_references().to_vec(),
            Event::Restarted(_) => continue,
        };
        if refs.is_empty() {
            continue;
        }
        if let Err(error) = reconciler.reconcile_owners(&refs, kind).await {
            tracing::warn!(%kind, %error, "Reconcile failed");
        }
    }
}

async fn reconcile<C: Cluster>(reconciler: &Reconciler<C>, def: &RBACDefinition) {
    if let Err(error) = reconciler.reconcile(def).await {
        tracing::warn!(definition = %def.name_any(), %error, "Reconcile failed");
    }
}

async fn namespace_change<C: Cluster>(reconciler: &Reconciler<C>, namespace: &str) {
    let definitions = match reconciler.cluster().list_rbac_definitions().await {
        Ok(definitions) => definitions,
        Err(error) => {
            tracing::warn!(%error, "Failed to list RBACDefinitions");
            return;
        }
    };
    for def in definitions {
        if !has_namespace_selectors(&def) {
            continue;
        }
        if let Err(error) = reconciler.reconcile_namespace_change(&def, namespace).await {
            tracing::warn!(definition = %def.name_any(), %namespace, %error, "Reconcile failed");
        }
    }
}

async fn resync_selector_users<C: Cluster>(reconciler: &Reconciler<C>) {
    let definitions = match reconciler.cluster().list_rbac_definitions().await {
        Ok(definitions) => definitions,
        Err(error) => {
            tracing::warn!(%error, "Failed to list RBACDefinitions");
            return;
        }
    };
    for def in definitions {
        if has_namespace_selectors(&def) {
            reconcile(reconciler, &def).await;
        }
    }
}
