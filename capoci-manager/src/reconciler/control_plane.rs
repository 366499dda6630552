//! Container engine clusters backing `OCIManagedControlPlane` objects.

use std::{collections::BTreeMap, time::Duration};

use capoci_core::{
    cloud::container_engine::{Cluster, ClusterEndpointConfig, CreateClusterDetails},
    conditions::{
        ConditionSeverity, Conditions, CONTROL_PLANE_DELETION_IN_PROGRESS_REASON,
        CONTROL_PLANE_NOT_READY_REASON, CONTROL_PLANE_PROVISION_FAILED_REASON,
        CONTROL_PLANE_READY, KUBECONFIG_RECONCILE_FAILED_REASON,
    },
    kubeconfig::KubeConfig,
    lifecycle::{ClusterLifecycleState, ControlPlanePhase},
    resources::{
        crd::v1beta1::{network::Role, ApiEndpoint},
        labels::get_cluster_labels,
    },
};
use k8s_openapi::{
    api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta, ByteString,
};
use kube::{
    runtime::{controller::Action, events::EventType},
    Resource,
};
use log::{info, warn};

use crate::{
    error::ReconcilerError,
    scope::{
        control_plane::KUBECONFIG_SECRET_KEY, remove_finalizer, ControlPlaneScope,
        CONTROL_PLANE_FINALIZER,
    },
};

use super::{lookup, Lookup};

pub const CONTROL_PLANE_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const CONTROL_PLANE_RESYNC_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_ENDPOINT_PORT: i32 = 6443;

async fn find_cluster(scope: &ControlPlaneScope) -> Result<Lookup<Cluster>, ReconcilerError> {
    let engine = &scope.clients.container_engine;

    lookup(
        "cluster",
        scope.accessor.resource_identifier(),
        scope.name(),
        scope
            .control_plane
            .spec
            .id
            .as_deref()
            .map(|id| engine.get_cluster(id)),
        || engine.list_clusters(scope.accessor.compartment_id(), scope.name()),
    )
    .await
}

fn create_details(scope: &ControlPlaneScope) -> Result<CreateClusterDetails, ReconcilerError> {
    let vcn_id = scope
        .accessor
        .network_spec()
        .vcn
        .id
        .clone()
        .ok_or_else(|| ReconcilerError::MissingObjectData("networkSpec.vcn.id".into()))?;
    let kubernetes_version = scope
        .control_plane
        .spec
        .version
        .clone()
        .ok_or_else(|| ReconcilerError::MissingObjectData("spec.version".into()))?;
    let subnet = scope
        .accessor
        .subnet(Role::ControlPlaneEndpoint)
        .ok_or_else(|| ReconcilerError::MissingObjectData("control-plane-endpoint subnet".into()))?;
    let subnet_id = subnet.id.clone().ok_or_else(|| {
        ReconcilerError::MissingObjectData("control-plane-endpoint subnet id".into())
    })?;

    Ok(CreateClusterDetails {
        name: scope.name().to_owned(),
        compartment_id: scope.accessor.compartment_id().to_owned(),
        vcn_id,
        kubernetes_version,
        endpoint_config: ClusterEndpointConfig {
            subnet_id,
            nsg_ids: scope
                .accessor
                .nsg(Role::ControlPlaneEndpoint)
                .and_then(|nsg| nsg.id.clone())
                .into_iter()
                .collect(),
            is_public_ip_enabled: !subnet.is_private(),
        },
        freeform_tags: scope.accessor.freeform_tags(),
        defined_tags: scope.accessor.defined_tags(),
    })
}

/// Returns the cluster of the control plane, creating it when there's none yet.
///
/// The id of a created cluster is read from the resources of its work request and persisted
/// right away, a failure later in the pass must not lead to a second cluster.
async fn get_or_create_cluster(scope: &mut ControlPlaneScope) -> Result<Cluster, ReconcilerError> {
    if let Some(existing) = find_cluster(scope).await?.owned("cluster")? {
        scope.control_plane.spec.id = Some(existing.id.clone());

        return Ok(existing);
    }

    let engine = scope.clients.container_engine.clone();
    let details = create_details(scope)?;
    let work_request_id = engine
        .create_cluster(details)
        .await
        .map_err(ReconcilerError::cloud("create cluster"))?;
    let work_request = engine
        .get_work_request(&work_request_id)
        .await
        .map_err(ReconcilerError::cloud("get work request"))?;

    let [resource] = work_request.resources.as_slice() else {
        return Err(ReconcilerError::AmbiguousWorkRequest(work_request.id));
    };
    let id = resource.identifier.clone();
    info!(
        "Creating cluster '{}' ({id}) for control plane {}/{}",
        scope.name(),
        scope.namespace(),
        scope.name()
    );

    scope.control_plane.spec.id = Some(id.clone());
    scope.patch_object().await?;

    engine
        .get_cluster(&id)
        .await
        .map_err(ReconcilerError::cloud("get cluster"))
}

fn record_lifecycle_state(scope: &mut ControlPlaneScope, cluster: &Cluster) -> ClusterLifecycleState {
    let state = ClusterLifecycleState::from(cluster.lifecycle_state.as_str());
    let status = scope.status_mut();

    if let Some(previous) = status
        .lifecycle_state
        .as_deref()
        .map(ClusterLifecycleState::from)
    {
        if !previous.can_transition_to(&state) {
            warn!(
                "Cluster {} moved from {previous} to {state}, which isn't a legal transition!",
                cluster.id
            );
        }
    }

    status.lifecycle_state = Some(state.to_string());
    status.version = Some(cluster.kubernetes_version.clone());

    state
}

fn parse_endpoint(address: &str) -> ApiEndpoint {
    let address = address.trim_start_matches("https://");

    match address.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => ApiEndpoint {
                host: host.to_owned(),
                port,
            },
            Err(_) => ApiEndpoint {
                host: address.to_owned(),
                port: DEFAULT_ENDPOINT_PORT,
            },
        },
        None => ApiEndpoint {
            host: address.to_owned(),
            port: DEFAULT_ENDPOINT_PORT,
        },
    }
}

/// Private endpoint when the endpoint subnet is private, public one otherwise.
fn cluster_endpoint(scope: &ControlPlaneScope, cluster: &Cluster) -> Result<ApiEndpoint, ReconcilerError> {
    let private = scope
        .accessor
        .subnet(Role::ControlPlaneEndpoint)
        .is_some_and(|subnet| subnet.is_private());
    let endpoints = cluster.endpoints.as_ref();
    let address = if private {
        endpoints.and_then(|e| e.private_endpoint.as_deref())
    } else {
        endpoints.and_then(|e| e.public_endpoint.as_deref())
    };

    address
        .map(parse_endpoint)
        .ok_or_else(|| ReconcilerError::MissingObjectData("cluster endpoints".into()))
}

/// Keeps the `<cluster>-kubeconfig` secret in sync with a fresh token.
///
/// An existing secret only gets its token replaced, the server and CA data it carries stay.
async fn reconcile_kubeconfig(scope: &ControlPlaneScope, cluster: &Cluster) -> Result<(), ReconcilerError> {
    let namespace = scope.namespace();
    let secret_name = scope.kubeconfig_secret_name();
    let user_name = scope.kubeconfig_user_name();
    let token = scope
        .clients
        .token
        .generate_token(&cluster.id)
        .await
        .map_err(ReconcilerError::cloud("generate token"))?;

    match scope.store.get_secret(namespace, &secret_name).await? {
        Some(mut secret) => {
            let data = secret.data.get_or_insert_with(BTreeMap::new);
            let current = data
                .get(KUBECONFIG_SECRET_KEY)
                .ok_or_else(|| ReconcilerError::MissingObjectData(secret_name.clone().into()))?;
            let yaml = std::str::from_utf8(&current.0)
                .map_err(|_| ReconcilerError::InvalidObjectData(secret_name.clone().into()))?;

            let mut config = KubeConfig::from_yaml(yaml).map_err(ReconcilerError::Kubeconfig)?;
            config
                .set_user_token(&user_name, token)
                .map_err(ReconcilerError::Kubeconfig)?;
            let yaml = config.to_yaml().map_err(ReconcilerError::Kubeconfig)?;
            data.insert(KUBECONFIG_SECRET_KEY.to_owned(), ByteString(yaml.into_bytes()));

            scope
                .store
                .replace_secret(namespace, &secret_name, secret)
                .await?;
        }
        None => {
            let document = scope
                .clients
                .container_engine
                .create_kubeconfig(&cluster.id)
                .await
                .map_err(ReconcilerError::cloud("create kubeconfig"))?;
            let yaml = KubeConfig::from_yaml(&document)
                .and_then(|config| config.to_token_config(&user_name, token))
                .and_then(|config| config.to_yaml())
                .map_err(ReconcilerError::Kubeconfig)?;
            let owner_references: Vec<_> = scope
                .control_plane
                .controller_owner_ref(&())
                .into_iter()
                .collect();

            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(secret_name.clone()),
                    namespace: Some(namespace.to_owned()),
                    labels: Some(get_cluster_labels(scope.cluster_name())),
                    owner_references: (!owner_references.is_empty()).then_some(owner_references),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(
                    KUBECONFIG_SECRET_KEY.to_owned(),
                    ByteString(yaml.into_bytes()),
                )])),
                ..Default::default()
            };

            scope.store.create_secret(namespace, secret).await?;
            info!("Created kubeconfig secret {namespace}/{secret_name}");
        }
    }

    Ok(())
}

pub async fn reconcile_control_plane(scope: &mut ControlPlaneScope) -> Result<Action, ReconcilerError> {
    if scope.has_failed() {
        info!(
            "Control plane {}/{} has failed, not reconciling it anymore",
            scope.namespace(),
            scope.name()
        );

        return Ok(Action::await_change());
    }

    let cluster = get_or_create_cluster(scope).await?;
    let state = record_lifecycle_state(scope, &cluster);

    match state.phase() {
        ControlPlanePhase::Provisioning => {
            let status = scope.status_mut();
            status.ready = false;
            status.mark_false(
                CONTROL_PLANE_READY,
                CONTROL_PLANE_NOT_READY_REASON,
                ConditionSeverity::Info,
                "",
            );

            Ok(Action::requeue(CONTROL_PLANE_POLL_INTERVAL))
        }
        ControlPlanePhase::Ready => {
            let endpoint = cluster_endpoint(scope, &cluster)?;
            scope.control_plane.spec.control_plane_endpoint = Some(endpoint);

            let status = scope.status_mut();
            status.ready = true;
            status.mark_true(CONTROL_PLANE_READY);

            if let Err(error) = reconcile_kubeconfig(scope, &cluster).await {
                warn!("Couldn't reconcile the kubeconfig of cluster {}: {error}", cluster.id);
                scope.status_mut().mark_false(
                    CONTROL_PLANE_READY,
                    KUBECONFIG_RECONCILE_FAILED_REASON,
                    ConditionSeverity::Error,
                    "",
                );

                return Err(error);
            }
            scope.status_mut().initialized = true;

            Ok(Action::requeue(CONTROL_PLANE_RESYNC_INTERVAL))
        }
        _ => {
            let message = format!("Cluster has invalid lifecycle state {state}");
            let status = scope.status_mut();
            status.mark_false(
                CONTROL_PLANE_READY,
                CONTROL_PLANE_PROVISION_FAILED_REASON,
                ConditionSeverity::Error,
                "",
            );
            status.ready = false;
            status.failure_reason = Some(CONTROL_PLANE_PROVISION_FAILED_REASON.to_owned());
            status.failure_message = Some(message.clone());

            scope
                .publish(
                    EventType::Warning,
                    CONTROL_PLANE_PROVISION_FAILED_REASON,
                    message.clone(),
                )
                .await;

            Err(ReconcilerError::UnexpectedLifecycleState(message))
        }
    }
}

fn mark_deleting(scope: &mut ControlPlaneScope) -> Action {
    let status = scope.status_mut();
    status.ready = false;
    status.mark_false(
        CONTROL_PLANE_READY,
        CONTROL_PLANE_DELETION_IN_PROGRESS_REASON,
        ConditionSeverity::Warning,
        "",
    );

    Action::requeue(CONTROL_PLANE_POLL_INTERVAL)
}

fn release(scope: &mut ControlPlaneScope) -> Action {
    info!(
        "Cluster of control plane {}/{} is gone",
        scope.namespace(),
        scope.name()
    );
    remove_finalizer(&mut scope.control_plane.metadata, CONTROL_PLANE_FINALIZER);

    Action::await_change()
}

/// Deletes the cluster of the control plane, the finalizer goes once the cluster is gone.
pub async fn delete_control_plane(scope: &mut ControlPlaneScope) -> Result<Action, ReconcilerError> {
    let Some(cluster) = find_cluster(scope).await?.deletable("cluster") else {
        return Ok(release(scope));
    };

    let state = record_lifecycle_state(scope, &cluster);

    match state.phase() {
        ControlPlanePhase::Gone => Ok(release(scope)),
        ControlPlanePhase::Deleting => Ok(mark_deleting(scope)),
        _ => {
            match scope.clients.container_engine.delete_cluster(&cluster.id).await {
                Ok(work_request_id) => {
                    info!("Deleting cluster {} (work request {work_request_id})", cluster.id);
                }
                Err(error) if error.is_not_found() => return Ok(release(scope)),
                Err(error) => return Err(ReconcilerError::cloud("delete cluster")(error)),
            }

            Ok(mark_deleting(scope))
        }
    }
}
