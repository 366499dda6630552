use std::sync::Arc;

use capoci_core::{
    cloud::network::{ResourceDetails, UpdateDetails},
    kubernetes::patch::PatchHelper,
    resources::crd::capi::Cluster,
    DEFAULT_API_SERVER_PORT,
};
use derive_builder::Builder;
use kube::runtime::events::EventType;

use crate::{
    clients::{ClientBundle, ClientProvider},
    error::ReconcilerError,
    events::EventPublisher,
    store::KubeStore,
};

use super::{builder_error, persist, ClusterAccessor};

#[derive(Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_fields"))]
pub struct ClusterScope {
    /// owner Cluster API cluster
    pub cluster: Cluster,
    pub accessor: ClusterAccessor,
    pub clients: ClientBundle,
    /// cache the clients of peer regions come from
    pub provider: Arc<ClientProvider>,
    pub store: Arc<dyn KubeStore>,
    pub events: Arc<dyn EventPublisher>,
    pub region: String,
    #[builder(setter(skip))]
    patch: PatchHelper<ClusterAccessor>,
}

impl ClusterScopeBuilder {
    pub fn build(self) -> Result<ClusterScope, ReconcilerError> {
        let mut scope = self.build_fields().map_err(builder_error)?;
        scope.patch.mark_persisted(&scope.accessor)?;

        Ok(scope)
    }
}

impl ClusterScope {
    pub fn name(&self) -> &str {
        self.accessor.name()
    }

    pub fn namespace(&self) -> &str {
        self.accessor.namespace()
    }

    pub fn compartment_id(&self) -> &str {
        self.accessor.compartment_id()
    }

    pub fn resource_identifier(&self) -> &str {
        self.accessor.resource_identifier()
    }

    pub fn api_server_port(&self) -> i32 {
        self.cluster
            .api_server_port()
            .unwrap_or(DEFAULT_API_SERVER_PORT)
    }

    /// name, compartment and tags of a resource created for this cluster
    pub fn resource_details(&self, display_name: &str) -> ResourceDetails {
        ResourceDetails {
            compartment_id: self.compartment_id().to_owned(),
            display_name: display_name.to_owned(),
            freeform_tags: self.accessor.freeform_tags(),
            defined_tags: self.accessor.defined_tags(),
        }
    }

    pub fn update_details(&self, display_name: &str) -> UpdateDetails {
        UpdateDetails {
            display_name: display_name.to_owned(),
            freeform_tags: self.accessor.freeform_tags(),
            defined_tags: self.accessor.defined_tags(),
        }
    }

    pub async fn publish(&self, type_: EventType, reason: &str, note: impl Into<String>) {
        self.events
            .publish(self.accessor.object_ref(), type_, reason, note.into())
            .await
    }

    /// Region key of `region`, e.g. `PHX` for `us-phoenix-1`.
    pub async fn region_code_for(&self, region: &str) -> Result<String, ReconcilerError> {
        let regions = self
            .clients
            .identity
            .list_regions()
            .await
            .map_err(ReconcilerError::cloud("list regions"))?;

        regions
            .into_iter()
            .find(|r| r.name == region)
            .map(|r| r.key)
            .ok_or_else(|| ReconcilerError::Configuration(format!("unknown region '{region}'")))
    }

    /// Region name of a region given either by its name or by its key.
    pub async fn resolve_region_name(&self, name_or_key: &str) -> Result<String, ReconcilerError> {
        let regions = self
            .clients
            .identity
            .list_regions()
            .await
            .map_err(ReconcilerError::cloud("list regions"))?;

        regions
            .into_iter()
            .find(|r| {
                r.name.eq_ignore_ascii_case(name_or_key) || r.key.eq_ignore_ascii_case(name_or_key)
            })
            .map(|r| r.name)
            .ok_or_else(|| {
                ReconcilerError::Configuration(format!("unknown region '{name_or_key}'"))
            })
    }

    /// Persists the changes made so far, e.g. a new finalizer or the id of a created resource.
    pub async fn patch_object(&mut self) -> Result<(), ReconcilerError> {
        let target = self.accessor.target();

        persist(self.store.as_ref(), &mut self.patch, &self.accessor, target).await
    }

    pub async fn close(mut self) -> Result<(), ReconcilerError> {
        self.patch_object().await
    }
}
