use std::sync::Arc;

use capoci_core::{
    conditions::{Conditions, CLUSTER_READY},
    defaults::{apply_network_defaults, validate_network},
    helpers::is_valid_ocid,
    resources::crd::v1beta1::cluster::OCICluster,
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
    reconciler::{
        failure_domain::reconcile_failure_domains,
        load_balancer::{delete_api_server_load_balancer, reconcile_api_server_load_balancer},
        network::{delete_network, reconcile_network},
    },
    scope::{add_finalizer, remove_finalizer, ClusterAccessor, ClusterScope, ClusterScopeBuilder},
};

use super::{
    finish, is_paused, managed_cluster::control_plane_endpoint, reconcile_error, with_timeout,
    ControllerContext, CLUSTER_PAUSED_REASON, OWNER_REF_NOT_SET_REASON,
};

pub async fn start_cluster_controller(api: Api<OCICluster>, context: Arc<ControllerContext>) {
    info!("Creating OCICluster controller...");

    let controller = Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_oci_cluster, reconcile_error, context)
        .for_each(handle_reconciliation_result);

    info!("OCICluster controller created!");

    controller.await
}

pub async fn reconcile_oci_cluster(
    cluster: Arc<OCICluster>,
    context: Arc<ControllerContext>,
) -> Result<Action, ReconcilerError> {
    reconcile_infrastructure(cluster.as_ref().clone().into(), &context).await
}

/// Single pass over an infrastructure cluster of any flavor.
pub(crate) async fn reconcile_infrastructure(
    accessor: ClusterAccessor,
    context: &ControllerContext,
) -> Result<Action, ReconcilerError> {
    let Some(cluster) = context.owner_cluster(accessor.meta()).await? else {
        info!(
            "Cluster Controller has not yet set OwnerRef on {} {}/{}",
            accessor.kind(),
            accessor.namespace(),
            accessor.name()
        );
        context
            .events
            .publish(
                accessor.object_ref(),
                EventType::Normal,
                OWNER_REF_NOT_SET_REASON,
                "Cluster Controller has not yet set OwnerRef".to_owned(),
            )
            .await;

        return Ok(Action::await_change());
    };

    if is_paused(&cluster, accessor.meta()) {
        info!(
            "{} {}/{} or its cluster is paused, not reconciling it",
            accessor.kind(),
            accessor.namespace(),
            accessor.name()
        );
        context
            .events
            .publish(
                accessor.object_ref(),
                EventType::Normal,
                CLUSTER_PAUSED_REASON,
                "Cluster is paused".to_owned(),
            )
            .await;

        return Ok(Action::await_change());
    }

    let region = context.region_of(accessor.region())?;
    let clients = context.clients_for(&region).await?;
    let mut scope = ClusterScopeBuilder::default()
        .cluster(cluster)
        .accessor(accessor)
        .clients(clients)
        .provider(context.provider.clone())
        .store(context.store.clone())
        .events(context.events.clone())
        .region(region)
        .build()?;

    let outcome = with_timeout(context.config.reconcile_timeout, run_pass(&mut scope)).await;

    finish(outcome, scope.close().await)
}

async fn run_pass(scope: &mut ClusterScope) -> Result<Action, ReconcilerError> {
    if scope.accessor.is_being_deleted() {
        delete_cluster(scope).await
    } else {
        reconcile_cluster(scope).await
    }
}

async fn reconcile_cluster(scope: &mut ClusterScope) -> Result<Action, ReconcilerError> {
    if !is_valid_ocid(scope.compartment_id()) {
        return Err(ReconcilerError::InvalidObjectData(
            format!("spec.compartmentId '{}'", scope.compartment_id()).into(),
        ));
    }

    let finalizer = scope.accessor.finalizer();
    if add_finalizer(scope.accessor.meta_mut(), finalizer) {
        scope.patch_object().await?;
    }

    let control_plane_endpoint = match scope.accessor {
        ClusterAccessor::ExternallyManaged(_) => control_plane_endpoint(scope).await?,
        ClusterAccessor::SelfManaged(_) | ClusterAccessor::Unmanaged(_) => None,
    };

    if scope.accessor.is_network_managed() {
        let port = scope.api_server_port();
        apply_network_defaults(scope.accessor.network_spec_mut(), port);
        validate_network(scope.accessor.network_spec()).map_err(ReconcilerError::InvalidNetwork)?;
    }

    reconcile_failure_domains(scope).await?;

    if scope.accessor.is_network_managed() {
        reconcile_network(scope).await?;
    } else {
        info!(
            "Network of {} {}/{} isn't managed by the provider, skipping it",
            scope.accessor.kind(),
            scope.namespace(),
            scope.name()
        );
    }

    if let Some(action) = reconcile_api_server_load_balancer(scope).await? {
        return Ok(action);
    }

    let status = scope.accessor.status_mut();
    status.ready = true;
    status.mark_true(CLUSTER_READY);

    if let Some(endpoint) = control_plane_endpoint {
        scope.accessor.set_control_plane_endpoint(endpoint);
    }

    Ok(Action::await_change())
}

async fn delete_cluster(scope: &mut ClusterScope) -> Result<Action, ReconcilerError> {
    delete_api_server_load_balancer(scope).await?;

    if scope.accessor.is_network_managed() {
        delete_network(scope).await?;
    } else {
        info!(
            "Network of {} {}/{} isn't managed by the provider, none of it is deleted",
            scope.accessor.kind(),
            scope.namespace(),
            scope.name()
        );
    }

    let finalizer = scope.accessor.finalizer();
    remove_finalizer(scope.accessor.meta_mut(), finalizer);
    info!(
        "Released {} {}/{}",
        scope.accessor.kind(),
        scope.namespace(),
        scope.name()
    );

    Ok(Action::await_change())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use capoci_core::resources::{
        crd::v1beta1::{FailureDomains, OCIClusterStatus},
        labels::{MANAGED_BY_ANNOTATION, PAUSED_ANNOTATION},
    };
    use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, chrono::Utc};
    use serde_json::json;

    use crate::{
        clients::{tests::empty_bundle, ClientProvider},
        controller::tests::{context_with, owned_by, FixedFactory},
        events::tests::RecordingPublisher,
        scope::{
            cluster::tests::{capi_cluster, oci_cluster},
            CLUSTER_FINALIZER,
        },
        store::tests::{MemoryStore, RecordedPatch},
    };

    use super::*;

    /// cluster managed by someone else, with its failure domains already discovered
    fn unmanaged_cluster() -> OCICluster {
        let mut cluster = oci_cluster();
        cluster.metadata.owner_references = owned_by("Cluster", "test");
        cluster.metadata.annotations = Some(BTreeMap::from([(
            MANAGED_BY_ANNOTATION.to_owned(),
            "external".to_owned(),
        )]));
        cluster.status = Some(OCIClusterStatus {
            failure_domains: Some(FailureDomains::new()),
            ..Default::default()
        });

        cluster
    }

    #[tokio::test]
    async fn cluster_without_owner_waits_for_it() {
        let store = Arc::new(MemoryStore::default().with_cluster(capi_cluster()));
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());

        let action = reconcile_oci_cluster(Arc::new(oci_cluster()), context)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(events.reasons(), [OWNER_REF_NOT_SET_REASON]);
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn paused_cluster_is_left_alone() {
        let store = Arc::new(MemoryStore::default().with_cluster(capi_cluster()));
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());
        let mut cluster = unmanaged_cluster();
        cluster
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(PAUSED_ANNOTATION.to_owned(), "true".to_owned());

        let action = reconcile_oci_cluster(Arc::new(cluster), context).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(events.reasons(), [CLUSTER_PAUSED_REASON]);
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn unmanaged_cluster_becomes_ready_without_cloud_calls() {
        let store = Arc::new(MemoryStore::default().with_cluster(capi_cluster()));
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());

        let action = reconcile_oci_cluster(Arc::new(unmanaged_cluster()), context)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        let patches = store.patches();
        assert_eq!(patches.len(), 2);
        assert_eq!(
            patches[0].patch,
            json!({ "metadata": { "finalizers": [CLUSTER_FINALIZER] } })
        );
        assert!(patches[1].status);
        assert_eq!(patches[1].patch["status"]["ready"], json!(true));
        assert_eq!(
            patches[1].patch["status"]["conditions"][0]["type"],
            json!(CLUSTER_READY)
        );
    }

    #[tokio::test]
    async fn deleted_unmanaged_cluster_only_drops_its_finalizer() {
        let store = Arc::new(MemoryStore::default().with_cluster(capi_cluster()));
        let events = Arc::new(RecordingPublisher::default());
        let context = context_with(empty_bundle(), store.clone(), events.clone());
        let mut cluster = unmanaged_cluster();
        cluster.metadata.finalizers = Some(vec![CLUSTER_FINALIZER.to_owned()]);
        cluster.metadata.deletion_timestamp = Some(Time(Utc::now()));

        let action = reconcile_oci_cluster(Arc::new(cluster), context).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(
            store.patches(),
            [RecordedPatch {
                kind: "OCICluster".to_owned(),
                name: "test".to_owned(),
                status: false,
                patch: json!({ "metadata": { "finalizers": [] } }),
            }]
        );
    }

    #[tokio::test]
    async fn cluster_without_region_is_rejected() {
        let store = Arc::new(MemoryStore::default().with_cluster(capi_cluster()));
        let events = Arc::new(RecordingPublisher::default());
        let context = Arc::new(ControllerContext {
            config: Default::default(),
            provider: Arc::new(ClientProvider::new(Arc::new(FixedFactory(empty_bundle())))),
            store: store.clone(),
            events,
        });

        let error = reconcile_oci_cluster(Arc::new(unmanaged_cluster()), context)
            .await
            .unwrap_err();

        assert!(matches!(error, ReconcilerError::Configuration(_)));
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn cluster_in_a_malformed_compartment_is_refused() {
        let store = Arc::new(MemoryStore::default().with_cluster(capi_cluster()));
        let context = context_with(
            empty_bundle(),
            store.clone(),
            Arc::new(RecordingPublisher::default()),
        );
        let mut cluster = unmanaged_cluster();
        cluster.spec.compartment_id = "my-compartment".to_owned();

        let error = reconcile_oci_cluster(Arc::new(cluster), context)
            .await
            .unwrap_err();

        assert!(matches!(error, ReconcilerError::InvalidObjectData(_)));
        assert!(store.patches().is_empty());
    }
}
