use std::sync::Arc;

use capoci_core::{
    helpers::RequireMetadata,
    resources::crd::{capi::Cluster, v1beta1::machine_pool::OCIMachinePool},
};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, events::EventType, watcher::Config, Controller},
    Api,
};
use log::info;

use crate::{
    error::ReconcilerError,
    helpers::handle_reconciliation_result,
    reconciler::machine_pool::{delete_machine_pool, reconcile_machine_pool},
    scope::{ClusterAccessor, MachinePoolScope, MachinePoolScopeBuilder},
    store::find_owner,
};

use super::{
    finish, is_paused, reconcile_error, with_timeout, ControllerContext, CLUSTER_API_GROUP,
    CLUSTER_NOT_AVAILABLE_REASON, DEPENDENCY_POLL_INTERVAL,
};

const MANAGED_CLUSTER_KIND: &str = "OCIManagedCluster";

pub async fn start_machine_pool_controller(
    api: Api<OCIMachinePool>,
    context: Arc<ControllerContext>,
) {
    info!("Creating OCIMachinePool controller...");

    let controller = Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_oci_machine_pool, reconcile_error, context)
        .for_each(handle_reconciliation_result);

    info!("OCIMachinePool controller created!");

    controller.await
}

/// Infrastructure cluster referenced by `cluster`, of either flavor.
async fn infrastructure_cluster(
    context: &ControllerContext,
    namespace: &str,
    cluster: &Cluster,
) -> Result<Option<ClusterAccessor>, ReconcilerError> {
    let Some(reference) = cluster.spec.infrastructure_ref.as_ref() else {
        return Ok(None);
    };

    let accessor = if reference.kind.as_deref() == Some(MANAGED_CLUSTER_KIND) {
        context
            .store
            .get_managed_cluster(namespace, &reference.name)
            .await?
            .map(ClusterAccessor::from)
    } else {
        context
            .store
            .get_oci_cluster(namespace, &reference.name)
            .await?
            .map(ClusterAccessor::from)
    };

    Ok(accessor)
}

pub async fn reconcile_oci_machine_pool(
    oci_machine_pool: Arc<OCIMachinePool>,
    context: Arc<ControllerContext>,
) -> Result<Action, ReconcilerError> {
    let oci_machine_pool = oci_machine_pool.as_ref().clone();
    let namespace = oci_machine_pool
        .require_namespace_or(ReconcilerError::MissingObjectMetadata)?
        .to_owned();
    let meta = &oci_machine_pool.metadata;

    let machine_pool = match find_owner(meta, "MachinePool", CLUSTER_API_GROUP) {
        Some((namespace, name)) => context.store.get_machine_pool(&namespace, &name).await?,
        None => None,
    };
    let Some(machine_pool) = machine_pool else {
        info!("MachinePool Controller has not yet set OwnerRef on machine pool {namespace}");

        return Ok(Action::await_change());
    };

    let Some(cluster) = context
        .store
        .get_cluster(&namespace, &machine_pool.spec.cluster_name)
        .await?
    else {
        info!(
            "Cluster '{}' of machine pool {namespace} doesn't exist",
            machine_pool.spec.cluster_name
        );

        return Ok(Action::await_change());
    };

    if is_paused(&cluster, meta) {
        info!("OCIMachinePool or its cluster is paused, not reconciling it");

        return Ok(Action::await_change());
    }

    let Some(accessor) = infrastructure_cluster(&context, &namespace, &cluster).await? else {
        context
            .publish(
                &oci_machine_pool,
                EventType::Warning,
                CLUSTER_NOT_AVAILABLE_REASON,
                "Cluster is not available yet",
            )
            .await;

        return Ok(Action::requeue(DEPENDENCY_POLL_INTERVAL));
    };

    let region = context.region_of(accessor.region())?;
    let clients = context.clients_for(&region).await?;
    let mut scope = MachinePoolScopeBuilder::default()
        .cluster(cluster)
        .accessor(accessor)
        .machine_pool(machine_pool)
        .oci_machine_pool(oci_machine_pool)
        .clients(clients)
        .store(context.store.clone())
        .events(context.events.clone())
        .build()?;

    let outcome = with_timeout(context.config.reconcile_timeout, run_pass(&mut scope)).await;

    finish(outcome, scope.close().await)
}

async fn run_pass(scope: &mut MachinePoolScope) -> Result<Action, ReconcilerError> {
    if scope.oci_machine_pool.metadata.deletion_timestamp.is_some() {
        delete_machine_pool(scope).await
    } else {
        reconcile_machine_pool(scope).await
    }
}

#[cfg(test)]
mod tests {
    use capoci_core::resources::crd::{
        capi::{ClusterStatus, MachinePool, MachinePoolSpec, ObjectReference},
        v1beta1::machine_pool::OCIMachinePoolSpec,
    };
    use serde_json::json;

    use crate::{
        clients::tests::empty_bundle,
        controller::tests::{context_with, owned_by},
        events::tests::RecordingPublisher,
        reconciler::machine_pool::MACHINE_POOL_POLL_INTERVAL,
        scope::{
            cluster::tests::{capi_cluster, oci_cluster},
            MACHINE_POOL_FINALIZER,
        },
        store::tests::MemoryStore,
    };

    use super::*;

    fn oci_machine_pool() -> OCIMachinePool {
        let mut pool = OCIMachinePool::new("test-pool", OCIMachinePoolSpec::default());
        pool.metadata.namespace = Some("default".to_owned());
        pool.metadata.owner_references = owned_by("MachinePool", "test-pool");

        pool
    }

    /// cluster with a not yet ready `OCICluster` behind it, `infrastructure` decides if it exists
    fn store_with(infrastructure: bool) -> Arc<MemoryStore> {
        let mut cluster = capi_cluster();
        cluster.spec.infrastructure_ref = Some(ObjectReference {
            kind: Some("OCICluster".to_owned()),
            name: "test".to_owned(),
            ..Default::default()
        });
        cluster.status = Some(ClusterStatus::default());
        let store = MemoryStore::default().with_cluster(cluster);

        let mut machine_pool = MachinePool::new(
            "test-pool",
            MachinePoolSpec {
                cluster_name: "test".to_owned(),
                ..Default::default()
            },
        );
        machine_pool.metadata.namespace = Some("default".to_owned());
        store
            .machine_pools
            .lock()
            .unwrap()
            .insert("default/test-pool".to_owned(), machine_pool);

        if infrastructure {
            store
                .oci_clusters
                .lock()
                .unwrap()
                .insert("default/test".to_owned(), oci_cluster());
        }

        Arc::new(store)
    }

    #[tokio::test]
    async fn machine_pool_without_owner_waits_for_it() {
        let store = store_with(true);
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());
        let mut orphan = oci_machine_pool();
        orphan.metadata.owner_references = None;

        let action = reconcile_oci_machine_pool(Arc::new(orphan), context)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        assert!(events.events().is_empty());
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn machine_pool_waits_for_its_infrastructure_cluster() {
        let store = store_with(false);
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());

        let action = reconcile_oci_machine_pool(Arc::new(oci_machine_pool()), context)
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(DEPENDENCY_POLL_INTERVAL));
        assert_eq!(events.reasons(), [CLUSTER_NOT_AVAILABLE_REASON]);
    }

    #[tokio::test]
    async fn machine_pool_of_a_paused_cluster_is_left_alone() {
        let store = store_with(true);
        store
            .clusters
            .lock()
            .unwrap()
            .get_mut("default/test")
            .unwrap()
            .spec
            .paused = true;
        let context = context_with(
            empty_bundle(),
            store.clone(),
            Arc::new(RecordingPublisher::default()),
        );

        let action = reconcile_oci_machine_pool(Arc::new(oci_machine_pool()), context)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn machine_pool_gets_its_finalizer_while_the_infrastructure_isnt_ready() {
        let store = store_with(true);
        let context = context_with(
            empty_bundle(),
            store.clone(),
            Arc::new(RecordingPublisher::default()),
        );

        let action = reconcile_oci_machine_pool(Arc::new(oci_machine_pool()), context)
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(MACHINE_POOL_POLL_INTERVAL));
        let patches = store.patches();
        assert_eq!(patches[0].kind, "OCIMachinePool");
        assert_eq!(
            patches[0].patch,
            json!({ "metadata": { "finalizers": [MACHINE_POOL_FINALIZER] } })
        );
    }
}
