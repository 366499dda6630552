use std::sync::Arc;

use capoci_core::{
    cloud::network::ResourceDetails,
    kubernetes::patch::PatchHelper,
    resources::crd::{
        capi::{Cluster, MachinePool},
        v1beta1::{
            machine_pool::{OCIMachinePool, OCIMachinePoolStatus},
            network::Role,
        },
    },
    tags::merge_with_cluster_tags,
};
use derive_builder::Builder;
use kube::{runtime::events::EventType, Resource};

use crate::{
    clients::ClientBundle, error::ReconcilerError, events::EventPublisher,
    store::{KubeStore, ObjectTarget},
};

use super::{builder_error, persist, ClusterAccessor};

pub const PROVIDER_ID_PREFIX: &str = "oci://";

#[derive(Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_fields"))]
pub struct MachinePoolScope {
    pub cluster: Cluster,
    /// the infrastructure cluster the pool joins
    pub accessor: ClusterAccessor,
    pub machine_pool: MachinePool,
    pub oci_machine_pool: OCIMachinePool,
    pub clients: ClientBundle,
    pub store: Arc<dyn KubeStore>,
    pub events: Arc<dyn EventPublisher>,
    #[builder(setter(skip))]
    patch: PatchHelper<OCIMachinePool>,
}

impl MachinePoolScopeBuilder {
    pub fn build(self) -> Result<MachinePoolScope, ReconcilerError> {
        let mut scope = self.build_fields().map_err(builder_error)?;
        scope.patch.mark_persisted(&scope.oci_machine_pool)?;

        Ok(scope)
    }
}

impl MachinePoolScope {
    pub fn name(&self) -> &str {
        self.oci_machine_pool
            .metadata
            .name
            .as_deref()
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.oci_machine_pool
            .metadata
            .namespace
            .as_deref()
            .unwrap_or_default()
    }

    pub fn compartment_id(&self) -> &str {
        self.accessor.compartment_id()
    }

    /// Name, compartment and tags of the pool's cloud resources.
    ///
    /// The provenance tags are the ones of the owning cluster, so pools are recognized by the
    /// same predicate as the network they run in.
    pub fn resource_details(&self) -> ResourceDetails {
        ResourceDetails {
            compartment_id: self.compartment_id().to_owned(),
            display_name: self.name().to_owned(),
            freeform_tags: merge_with_cluster_tags(
                Some(&self.accessor.freeform_tags()),
                self.accessor.resource_identifier(),
            ),
            defined_tags: self.accessor.defined_tags(),
        }
    }

    pub fn worker_subnet_id(&self) -> Option<&str> {
        self.accessor
            .subnet(Role::Worker)
            .and_then(|s| s.id.as_deref())
    }

    pub fn worker_nsg_id(&self) -> Option<&str> {
        self.accessor.nsg(Role::Worker).and_then(|n| n.id.as_deref())
    }

    /// availability domain of the failure domain `id`
    pub fn failure_domain_availability_domain(&self, id: &str) -> Option<&str> {
        self.accessor
            .status()?
            .failure_domains
            .as_ref()?
            .get(id)?
            .attributes
            .as_ref()?
            .get("AvailabilityDomain")
            .map(String::as_str)
    }

    /// instance pool id recorded in the provider id
    pub fn instance_pool_id(&self) -> Option<&str> {
        self.oci_machine_pool
            .spec
            .provider_id
            .as_deref()
            .and_then(|id| id.strip_prefix(PROVIDER_ID_PREFIX))
            .filter(|id| !id.is_empty())
    }

    pub fn status(&self) -> Option<&OCIMachinePoolStatus> {
        self.oci_machine_pool.status.as_ref()
    }

    pub fn status_mut(&mut self) -> &mut OCIMachinePoolStatus {
        self.oci_machine_pool
            .status
            .get_or_insert_with(OCIMachinePoolStatus::default)
    }

    pub fn has_failed(&self) -> bool {
        self.status().map(|s| s.has_failed()).unwrap_or(false)
    }

    pub async fn publish(&self, type_: EventType, reason: &str, note: impl Into<String>) {
        self.events
            .publish(
                self.oci_machine_pool.object_ref(&()),
                type_,
                reason,
                note.into(),
            )
            .await
    }

    pub async fn patch_object(&mut self) -> Result<(), ReconcilerError> {
        let target = ObjectTarget::of::<OCIMachinePool>(self.namespace(), self.name());

        persist(
            self.store.as_ref(),
            &mut self.patch,
            &self.oci_machine_pool,
            target,
        )
        .await
    }

    pub async fn close(mut self) -> Result<(), ReconcilerError> {
        self.patch_object().await
    }
}
