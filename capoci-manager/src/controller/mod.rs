use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Context;
use capoci_core::resources::{
    crd::capi::Cluster,
    labels::{has_annotation, PAUSED_ANNOTATION},
};
use k8s_openapi::{apimachinery::pkg::apis::meta::v1::ObjectMeta, NamespaceResourceScope};
use kube::{
    runtime::{controller::Action, events::EventType},
    Api, Client, Resource,
};
use log::{info, warn};
use tokio::join;

use crate::{
    clients::{ClientBundle, ClientFactory, ClientProvider},
    config::ManagerConfig,
    error::ReconcilerError,
    events::{EventPublisher, RecorderPublisher},
    store::{find_owner, KubeClientStore, KubeStore},
};

use self::{
    cluster::start_cluster_controller, control_plane::start_control_plane_controller,
    machine_pool::start_machine_pool_controller,
    managed_cluster::start_managed_cluster_controller,
};

pub mod cluster;
pub mod control_plane;
pub mod machine_pool;
pub mod managed_cluster;

pub const CLUSTER_API_GROUP: &str = "cluster.x-k8s.io";
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(10);
/// poll interval while a parent object isn't there or isn't ready yet
pub const DEPENDENCY_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const OWNER_REF_NOT_SET_REASON: &str = "OwnerRefNotSet";
pub const CLUSTER_PAUSED_REASON: &str = "ClusterPaused";
pub const CLUSTER_NOT_AVAILABLE_REASON: &str = "ClusterNotAvailable";
pub const CLUSTER_INFRASTRUCTURE_NOT_READY_REASON: &str = "ClusterInfrastructureNotReady";

pub struct ControllerContext {
    pub config: ManagerConfig,
    pub provider: Arc<ClientProvider>,
    pub store: Arc<dyn KubeStore>,
    pub events: Arc<dyn EventPublisher>,
}

impl ControllerContext {
    /// Region a cluster lives in, its own `spec.region` wins over the manager default.
    pub fn region_of(&self, cluster_region: Option<&str>) -> Result<String, ReconcilerError> {
        cluster_region
            .filter(|region| !region.is_empty())
            .or(self.config.region.as_deref())
            .filter(|region| !region.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| ReconcilerError::Configuration("region can't be empty".to_owned()))
    }

    pub async fn clients_for(&self, region: &str) -> Result<ClientBundle, ReconcilerError> {
        self.provider
            .get_or_build_client(region)
            .await
            .map_err(ReconcilerError::Client)
    }

    /// Owner Cluster API cluster of an infrastructure object.
    pub async fn owner_cluster(&self, meta: &ObjectMeta) -> Result<Option<Cluster>, ReconcilerError> {
        match find_owner(meta, "Cluster", CLUSTER_API_GROUP) {
            Some((namespace, name)) => Ok(self.store.get_cluster(&namespace, &name).await?),
            None => Ok(None),
        }
    }

    pub async fn publish<K: Resource<DynamicType = ()>>(
        &self,
        object: &K,
        type_: EventType,
        reason: &str,
        note: &str,
    ) {
        self.events
            .publish(object.object_ref(&()), type_, reason, note.to_owned())
            .await
    }
}

pub fn is_paused(cluster: &Cluster, meta: &ObjectMeta) -> bool {
    cluster.is_paused() || has_annotation(meta.annotations.as_ref(), PAUSED_ANNOTATION)
}

pub fn reconcile_error<K>(
    _object: Arc<K>,
    _error: &ReconcilerError,
    _context: Arc<ControllerContext>,
) -> Action {
    Action::requeue(DEFAULT_ERROR_REQUEUE)
}

/// Runs a single pass, giving up once `timeout` elapses.
pub async fn with_timeout<F>(timeout: Duration, pass: F) -> Result<Action, ReconcilerError>
where
    F: Future<Output = Result<Action, ReconcilerError>>,
{
    match tokio::time::timeout(timeout, pass).await {
        Ok(result) => result,
        Err(_) => Err(ReconcilerError::Cancelled(timeout)),
    }
}

/// Result of a pass after its scope was closed, the error of the pass wins over the close error.
pub fn finish(
    outcome: Result<Action, ReconcilerError>,
    closed: Result<(), ReconcilerError>,
) -> Result<Action, ReconcilerError> {
    match (outcome, closed) {
        (Ok(action), Ok(())) => Ok(action),
        (Ok(_), Err(error)) => Err(error),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(close_error)) => {
            warn!("Couldn't persist the state of a failed pass! {close_error}");
            Err(error)
        }
    }
}

fn watched_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

pub async fn run_manager(client: Client, factory: Arc<dyn ClientFactory>, config: ManagerConfig) {
    let namespace = config.watch_namespace.clone();
    let machine_pool_enabled = config.machine_pool_enabled;

    let context = Arc::new(ControllerContext {
        config,
        provider: Arc::new(ClientProvider::new(factory)),
        store: Arc::new(KubeClientStore::new(client.clone())),
        events: Arc::new(RecorderPublisher::new(client.clone())),
    });

    let clusters = start_cluster_controller(
        watched_api(&client, namespace.as_deref()),
        context.clone(),
    );
    let managed_clusters = start_managed_cluster_controller(
        watched_api(&client, namespace.as_deref()),
        context.clone(),
    );
    let control_planes = start_control_plane_controller(
        watched_api(&client, namespace.as_deref()),
        context.clone(),
    );

    if machine_pool_enabled {
        let machine_pools = start_machine_pool_controller(
            watched_api(&client, namespace.as_deref()),
            context.clone(),
        );

        join!(clusters, managed_clusters, control_planes, machine_pools);
    } else {
        info!("Machine pool support is disabled, not starting its controller");

        join!(clusters, managed_clusters, control_planes);
    }
}

/// Reads the configuration from the environment and runs every controller until shutdown.
pub async fn main_manager(factory: Arc<dyn ClientFactory>) -> anyhow::Result<()> {
    let config = ManagerConfig::from_env().context("Couldn't read the manager configuration")?;
    let client = Client::try_default()
        .await
        .context("Couldn't create the Kubernetes client")?;

    run_manager(client, factory, config).await;

    Ok(())
}
