use std::time::Duration;

use capoci_core::{
    cloud::load_balancer::{CreateNetworkLoadBalancerDetails, NetworkLoadBalancer},
    resources::crd::v1beta1::{network::Role, ApiEndpoint},
};
use kube::runtime::controller::Action;
use log::{error, info};

use crate::{
    error::ReconcilerError,
    scope::{ClusterAccessor, ClusterScope},
};

use super::{delete_ignoring_missing, lookup};

pub const LOAD_BALANCER_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const API_SERVER_BACKEND_SET_NAME: &str = "apiserver";

const ACTIVE_STATE: &str = "ACTIVE";
const FAILED_STATE: &str = "FAILED";

fn load_balancer_name(scope: &ClusterScope) -> String {
    scope
        .accessor
        .api_server_load_balancer()
        .and_then(|lb| lb.name.clone())
        .unwrap_or_else(|| format!("{}-apiserver", scope.name()))
}

fn endpoint_of(load_balancer: &NetworkLoadBalancer, port: i32) -> Option<ApiEndpoint> {
    load_balancer
        .ip_addresses
        .iter()
        .find(|ip| ip.is_public)
        .or_else(|| load_balancer.ip_addresses.first())
        .map(|ip| ApiEndpoint {
            host: ip.ip_address.clone(),
            port,
        })
}

/// Provisions the network load balancer in front of the API servers of a self managed cluster.
///
/// Returns a requeue until the load balancer is active and its address became the cluster's
/// control plane endpoint.
pub async fn reconcile_api_server_load_balancer(
    scope: &mut ClusterScope,
) -> Result<Option<Action>, ReconcilerError> {
    if !matches!(scope.accessor, ClusterAccessor::SelfManaged(_)) {
        return Ok(None);
    }

    let client = scope.clients.load_balancer.clone();
    let name = load_balancer_name(scope);
    let stored = scope
        .accessor
        .api_server_load_balancer()
        .and_then(|lb| lb.load_balancer_id.clone());

    let found = lookup(
        "network load balancer",
        scope.resource_identifier(),
        &name,
        stored
            .as_deref()
            .map(|id| client.get_network_load_balancer(id)),
        || client.list_network_load_balancers(scope.compartment_id(), &name),
    )
    .await?
    .owned("network load balancer")?;

    let load_balancer = match found {
        Some(existing) => existing,
        None => {
            let subnet = scope
                .accessor
                .subnet(Role::ControlPlaneEndpoint)
                .ok_or_else(|| {
                    ReconcilerError::MissingObjectData("control-plane-endpoint subnet".into())
                })?;
            let subnet_id = subnet.id.clone().ok_or_else(|| {
                ReconcilerError::MissingObjectData("control-plane-endpoint subnet id".into())
            })?;
            let nsg_ids = scope
                .accessor
                .nsg(Role::ControlPlaneEndpoint)
                .and_then(|nsg| nsg.id.clone())
                .into_iter()
                .collect();

            let created = client
                .create_network_load_balancer(CreateNetworkLoadBalancerDetails {
                    details: scope.resource_details(&name),
                    subnet_id,
                    nsg_ids,
                    is_private: subnet.is_private(),
                    listener_port: scope.api_server_port(),
                    backend_set_name: API_SERVER_BACKEND_SET_NAME.to_owned(),
                })
                .await
                .map_err(ReconcilerError::cloud("create network load balancer"))?;
            info!("Created network load balancer '{name}' ({})", created.id);

            created
        }
    };

    if let Some(spec) = scope.accessor.api_server_load_balancer_mut() {
        spec.name = Some(name.clone());
        spec.load_balancer_id = Some(load_balancer.id.clone());
    }

    match load_balancer.lifecycle_state.as_str() {
        ACTIVE_STATE => {
            let endpoint = endpoint_of(&load_balancer, scope.api_server_port()).ok_or_else(|| {
                ReconcilerError::MissingObjectData("network load balancer ip address".into())
            })?;
            scope.accessor.set_control_plane_endpoint(endpoint);

            Ok(None)
        }
        FAILED_STATE => {
            error!("Network load balancer '{name}' ({}) failed!", load_balancer.id);

            Err(ReconcilerError::UnexpectedLifecycleState(format!(
                "network load balancer {} is {FAILED_STATE}",
                load_balancer.id
            )))
        }
        _ => Ok(Some(Action::requeue(LOAD_BALANCER_POLL_INTERVAL))),
    }
}

pub async fn delete_api_server_load_balancer(scope: &ClusterScope) -> Result<(), ReconcilerError> {
    if !matches!(scope.accessor, ClusterAccessor::SelfManaged(_)) {
        return Ok(());
    }

    let client = &scope.clients.load_balancer;
    let name = load_balancer_name(scope);
    let found = lookup(
        "network load balancer",
        scope.resource_identifier(),
        &name,
        scope
            .accessor
            .api_server_load_balancer()
            .and_then(|lb| lb.load_balancer_id.as_deref())
            .map(|id| client.get_network_load_balancer(id)),
        || client.list_network_load_balancers(scope.compartment_id(), &name),
    )
    .await?
    .deletable("network load balancer");

    if let Some(existing) = found {
        delete_ignoring_missing(
            "network load balancer",
            client.delete_network_load_balancer(&existing.id),
        )
        .await?;
        info!("Deleted network load balancer '{name}' ({})", existing.id);
    }

    Ok(())
}
