use std::sync::Arc;

use capoci_core::{
    kubernetes::patch::PatchHelper,
    resources::crd::{
        capi::Cluster,
        v1beta1::managed_control_plane::{OCIManagedControlPlane, OCIManagedControlPlaneStatus},
    },
};
use derive_builder::Builder;
use kube::{runtime::events::EventType, Resource};

use crate::{
    clients::ClientBundle, error::ReconcilerError, events::EventPublisher,
    store::{KubeStore, ObjectTarget},
};

use super::{builder_error, persist, ClusterAccessor};

pub const KUBECONFIG_SECRET_SUFFIX: &str = "kubeconfig";
pub const KUBECONFIG_SECRET_KEY: &str = "value";

#[derive(Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_fields"))]
pub struct ControlPlaneScope {
    pub cluster: Cluster,
    /// the managed cluster whose network the control plane is placed in
    pub accessor: ClusterAccessor,
    pub control_plane: OCIManagedControlPlane,
    pub clients: ClientBundle,
    pub store: Arc<dyn KubeStore>,
    pub events: Arc<dyn EventPublisher>,
    #[builder(setter(skip))]
    patch: PatchHelper<OCIManagedControlPlane>,
}

impl ControlPlaneScopeBuilder {
    pub fn build(self) -> Result<ControlPlaneScope, ReconcilerError> {
        let mut scope = self.build_fields().map_err(builder_error)?;
        scope.patch.mark_persisted(&scope.control_plane)?;

        Ok(scope)
    }
}

impl ControlPlaneScope {
    /// name of the control plane, also used as the container engine cluster name
    pub fn name(&self) -> &str {
        self.control_plane.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.control_plane
            .metadata
            .namespace
            .as_deref()
            .unwrap_or_default()
    }

    pub fn cluster_name(&self) -> &str {
        self.cluster.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn kubeconfig_secret_name(&self) -> String {
        format!("{}-{KUBECONFIG_SECRET_SUFFIX}", self.cluster_name())
    }

    pub fn kubeconfig_user_name(&self) -> String {
        format!("{}-capi-admin", self.name())
    }

    pub fn status(&self) -> Option<&OCIManagedControlPlaneStatus> {
        self.control_plane.status.as_ref()
    }

    pub fn status_mut(&mut self) -> &mut OCIManagedControlPlaneStatus {
        self.control_plane
            .status
            .get_or_insert_with(OCIManagedControlPlaneStatus::default)
    }

    pub fn has_failed(&self) -> bool {
        self.status().map(|s| s.has_failed()).unwrap_or(false)
    }

    pub async fn publish(&self, type_: EventType, reason: &str, note: impl Into<String>) {
        self.events
            .publish(
                self.control_plane.object_ref(&()),
                type_,
                reason,
                note.into(),
            )
            .await
    }

    pub async fn patch_object(&mut self) -> Result<(), ReconcilerError> {
        let target = ObjectTarget::of::<OCIManagedControlPlane>(self.namespace(), self.name());

        persist(
            self.store.as_ref(),
            &mut self.patch,
            &self.control_plane,
            target,
        )
        .await
    }

    pub async fn close(mut self) -> Result<(), ReconcilerError> {
        self.patch_object().await
    }
}
