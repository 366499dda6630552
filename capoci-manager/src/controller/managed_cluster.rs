use std::sync::Arc;

use capoci_core::resources::crd::v1beta1::{managed_cluster::OCIManagedCluster, ApiEndpoint};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api,
};
use log::info;

use crate::{error::ReconcilerError, helpers::handle_reconciliation_result, scope::ClusterScope};

use super::{cluster::reconcile_infrastructure, reconcile_error, ControllerContext};

pub async fn start_managed_cluster_controller(
    api: Api<OCIManagedCluster>,
    context: Arc<ControllerContext>,
) {
    info!("Creating OCIManagedCluster controller...");

    let controller = Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_managed_cluster, reconcile_error, context)
        .for_each(handle_reconciliation_result);

    info!("OCIManagedCluster controller created!");

    controller.await
}

pub async fn reconcile_managed_cluster(
    cluster: Arc<OCIManagedCluster>,
    context: Arc<ControllerContext>,
) -> Result<Action, ReconcilerError> {
    reconcile_infrastructure(cluster.as_ref().clone().into(), &context).await
}

/// Endpoint the managed control plane of the cluster published so far.
///
/// The control plane referenced by the owner cluster has to exist, its endpoint is optional.
pub(crate) async fn control_plane_endpoint(
    scope: &ClusterScope,
) -> Result<Option<ApiEndpoint>, ReconcilerError> {
    let reference = scope
        .cluster
        .spec
        .control_plane_ref
        .as_ref()
        .ok_or_else(|| ReconcilerError::MissingObjectData("spec.controlPlaneRef".into()))?;

    let control_plane = scope
        .store
        .get_managed_control_plane(scope.namespace(), &reference.name)
        .await?
        .ok_or_else(|| {
            ReconcilerError::MissingObjectData(
                format!("control plane {}/{}", scope.namespace(), reference.name).into(),
            )
        })?;

    Ok(control_plane
        .spec
        .control_plane_endpoint
        .filter(|endpoint| !endpoint.is_zero()))
}
