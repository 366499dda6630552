use std::sync::Arc;

use capoci_core::{
    helpers::RequireMetadata,
    resources::crd::v1beta1::managed_control_plane::OCIManagedControlPlane,
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
    reconciler::control_plane::{delete_control_plane, reconcile_control_plane},
    scope::{
        add_finalizer, ClusterAccessor, ControlPlaneScope, ControlPlaneScopeBuilder,
        CONTROL_PLANE_FINALIZER,
    },
};

use super::{
    finish, is_paused, reconcile_error, with_timeout, ControllerContext,
    CLUSTER_INFRASTRUCTURE_NOT_READY_REASON, CLUSTER_NOT_AVAILABLE_REASON, CLUSTER_PAUSED_REASON,
    DEPENDENCY_POLL_INTERVAL, OWNER_REF_NOT_SET_REASON,
};

pub async fn start_control_plane_controller(
    api: Api<OCIManagedControlPlane>,
    context: Arc<ControllerContext>,
) {
    info!("Creating OCIManagedControlPlane controller...");

    let controller = Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_managed_control_plane, reconcile_error, context)
        .for_each(handle_reconciliation_result);

    info!("OCIManagedControlPlane controller created!");

    controller.await
}

pub async fn reconcile_managed_control_plane(
    control_plane: Arc<OCIManagedControlPlane>,
    context: Arc<ControllerContext>,
) -> Result<Action, ReconcilerError> {
    let control_plane = control_plane.as_ref().clone();
    let namespace = control_plane
        .require_namespace_or(ReconcilerError::MissingObjectMetadata)?
        .to_owned();

    let Some(cluster) = context.owner_cluster(&control_plane.metadata).await? else {
        info!("Cluster Controller has not yet set OwnerRef on control plane {namespace}");
        context
            .publish(
                &control_plane,
                EventType::Normal,
                OWNER_REF_NOT_SET_REASON,
                "Cluster Controller has not yet set OwnerRef",
            )
            .await;

        return Ok(Action::await_change());
    };

    if is_paused(&cluster, &control_plane.metadata) {
        context
            .publish(
                &control_plane,
                EventType::Normal,
                CLUSTER_PAUSED_REASON,
                "Cluster is paused",
            )
            .await;

        return Ok(Action::await_change());
    }

    let managed_cluster = match cluster.spec.infrastructure_ref.as_ref() {
        Some(reference) => {
            context
                .store
                .get_managed_cluster(&namespace, &reference.name)
                .await?
        }
        None => None,
    };
    let Some(managed_cluster) = managed_cluster else {
        context
            .publish(
                &control_plane,
                EventType::Warning,
                CLUSTER_NOT_AVAILABLE_REASON,
                "Cluster is not available yet",
            )
            .await;

        return Ok(Action::requeue(DEPENDENCY_POLL_INTERVAL));
    };

    if !managed_cluster.status.as_ref().is_some_and(|status| status.ready) {
        context
            .publish(
                &control_plane,
                EventType::Warning,
                CLUSTER_INFRASTRUCTURE_NOT_READY_REASON,
                "Cluster infrastructure is not ready",
            )
            .await;

        return Ok(Action::requeue(DEPENDENCY_POLL_INTERVAL));
    }

    let accessor = ClusterAccessor::from(managed_cluster);
    let region = context.region_of(accessor.region())?;
    let clients = context.clients_for(&region).await?;
    let mut scope = ControlPlaneScopeBuilder::default()
        .cluster(cluster)
        .accessor(accessor)
        .control_plane(control_plane)
        .clients(clients)
        .store(context.store.clone())
        .events(context.events.clone())
        .build()?;

    let outcome = with_timeout(context.config.reconcile_timeout, run_pass(&mut scope)).await;

    finish(outcome, scope.close().await)
}

async fn run_pass(scope: &mut ControlPlaneScope) -> Result<Action, ReconcilerError> {
    if scope.control_plane.metadata.deletion_timestamp.is_some() {
        return delete_control_plane(scope).await;
    }

    if add_finalizer(&mut scope.control_plane.metadata, CONTROL_PLANE_FINALIZER) {
        scope.patch_object().await?;
    }

    reconcile_control_plane(scope).await
}

#[cfg(test)]
mod tests {
    use capoci_core::{
        cloud::container_engine::MockContainerEngineClient,
        resources::crd::{
            capi::ObjectReference,
            v1beta1::{
                managed_cluster::{OCIManagedCluster, OCIManagedClusterSpec},
                managed_control_plane::OCIManagedControlPlaneSpec,
                OCIClusterStatus,
            },
        },
    };
    use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, chrono::Utc};
    use mockall::predicate::eq;
    use serde_json::json;

    use crate::{
        clients::tests::empty_bundle,
        controller::tests::{context_with, owned_by},
        events::tests::RecordingPublisher,
        scope::cluster::tests::capi_cluster,
        store::tests::MemoryStore,
    };

    use super::*;

    fn control_plane() -> OCIManagedControlPlane {
        let mut control_plane = OCIManagedControlPlane::new(
            "test-cp",
            OCIManagedControlPlaneSpec {
                version: Some("v1.27.2".to_owned()),
                ..Default::default()
            },
        );
        control_plane.metadata.namespace = Some("default".to_owned());
        control_plane.metadata.uid = Some("cp-uid".to_owned());
        control_plane.metadata.owner_references = owned_by("Cluster", "test");

        control_plane
    }

    fn store_with(managed_cluster: Option<OCIManagedCluster>) -> Arc<MemoryStore> {
        let mut cluster = capi_cluster();
        cluster.spec.infrastructure_ref = Some(ObjectReference {
            kind: Some("OCIManagedCluster".to_owned()),
            name: "test".to_owned(),
            ..Default::default()
        });
        let store = MemoryStore::default().with_cluster(cluster);

        if let Some(managed_cluster) = managed_cluster {
            store
                .managed_clusters
                .lock()
                .unwrap()
                .insert("default/test".to_owned(), managed_cluster);
        }

        Arc::new(store)
    }

    fn managed_cluster(ready: bool) -> OCIManagedCluster {
        let mut cluster = OCIManagedCluster::new(
            "test",
            OCIManagedClusterSpec {
                oci_resource_identifier: "resource-uid".to_owned(),
                compartment_id: "ocid1.compartment.oc1..aaaa".to_owned(),
                ..Default::default()
            },
        );
        cluster.metadata.namespace = Some("default".to_owned());
        cluster.status = Some(OCIClusterStatus {
            ready,
            ..Default::default()
        });

        cluster
    }

    #[tokio::test]
    async fn control_plane_waits_for_its_managed_cluster() {
        let store = store_with(None);
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());

        let action = reconcile_managed_control_plane(Arc::new(control_plane()), context)
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(DEPENDENCY_POLL_INTERVAL));
        let recorded = events.events();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].warning);
        assert_eq!(recorded[0].reason, CLUSTER_NOT_AVAILABLE_REASON);
        assert_eq!(recorded[0].object, "test-cp");
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn control_plane_waits_for_the_cluster_infrastructure() {
        let store = store_with(Some(managed_cluster(false)));
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());

        let action = reconcile_managed_control_plane(Arc::new(control_plane()), context)
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(DEPENDENCY_POLL_INTERVAL));
        assert_eq!(events.reasons(), [CLUSTER_INFRASTRUCTURE_NOT_READY_REASON]);
    }

    #[tokio::test]
    async fn control_plane_without_owner_waits_for_it() {
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store_with(None), events.clone());
        let mut orphan = control_plane();
        orphan.metadata.owner_references = None;

        let action = reconcile_managed_control_plane(Arc::new(orphan), context)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(events.reasons(), [OWNER_REF_NOT_SET_REASON]);
    }

    #[tokio::test]
    async fn deleted_control_plane_without_cluster_is_released() {
        let mut engine = MockContainerEngineClient::new();
        engine
            .expect_list_clusters()
            .with(eq("ocid1.compartment.oc1..aaaa"), eq("test-cp"))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        engine.expect_delete_cluster().never();
        let mut clients = empty_bundle();
        clients.container_engine = Arc::new(engine);
        let store = store_with(Some(managed_cluster(true)));
        let context = context_with(clients, store.clone(), Arc::new(RecordingPublisher::default()));
        let mut deleted = control_plane();
        deleted.metadata.finalizers = Some(vec![CONTROL_PLANE_FINALIZER.to_owned()]);
        deleted.metadata.deletion_timestamp = Some(Time(Utc::now()));

        let action = reconcile_managed_control_plane(Arc::new(deleted), context)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        let patches = store.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].kind, "OCIManagedControlPlane");
        assert_eq!(patches[0].patch, json!({ "metadata": { "finalizers": [] } }));
    }
}
