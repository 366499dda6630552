use capoci_core::{
    resources::{
        crd::v1beta1::{
            cluster::OCICluster,
            managed_cluster::OCIManagedCluster,
            network::{LoadBalancer, NetworkSpec, Nsg, Role, Subnet},
            ApiEndpoint, OCIClusterStatus,
        },
        labels::{has_annotation, MANAGED_BY_ANNOTATION},
    },
    tags::{copy_defined_tags, merge_with_cluster_tags, DefinedTags, FreeformTags},
};
use k8s_openapi::{
    api::core::v1::ObjectReference, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::Resource;
use serde::Serialize;

use crate::store::ObjectTarget;

use super::{CLUSTER_FINALIZER, MANAGED_CLUSTER_FINALIZER};

/// The cluster flavors the provider reconciles, behind one set of accessors.
///
/// * `SelfManaged`: network and API server load balancer are created by the provider
/// * `Unmanaged`: an `OCICluster` annotated as managed by someone else, nothing is created
/// * `ExternallyManaged`: the container engine runs the control plane, no load balancer
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ClusterAccessor {
    SelfManaged(OCICluster),
    Unmanaged(OCICluster),
    ExternallyManaged(OCIManagedCluster),
}

macro_rules! on_cluster {
    ($accessor:expr, $cluster:ident => $body:expr) => {
        match $accessor {
            ClusterAccessor::SelfManaged($cluster) | ClusterAccessor::Unmanaged($cluster) => $body,
            ClusterAccessor::ExternallyManaged($cluster) => $body,
        }
    };
}

impl From<OCICluster> for ClusterAccessor {
    fn from(value: OCICluster) -> Self {
        if has_annotation(value.metadata.annotations.as_ref(), MANAGED_BY_ANNOTATION) {
            ClusterAccessor::Unmanaged(value)
        } else {
            ClusterAccessor::SelfManaged(value)
        }
    }
}

impl From<OCIManagedCluster> for ClusterAccessor {
    fn from(value: OCIManagedCluster) -> Self {
        ClusterAccessor::ExternallyManaged(value)
    }
}

impl ClusterAccessor {
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterAccessor::SelfManaged(_) | ClusterAccessor::Unmanaged(_) => "OCICluster",
            ClusterAccessor::ExternallyManaged(_) => "OCIManagedCluster",
        }
    }

    pub fn finalizer(&self) -> &'static str {
        match self {
            ClusterAccessor::SelfManaged(_) | ClusterAccessor::Unmanaged(_) => CLUSTER_FINALIZER,
            ClusterAccessor::ExternallyManaged(_) => MANAGED_CLUSTER_FINALIZER,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        on_cluster!(self, c => &c.metadata)
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        on_cluster!(self, c => &mut c.metadata)
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    pub fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    pub fn object_ref(&self) -> ObjectReference {
        on_cluster!(self, c => c.object_ref(&()))
    }

    pub fn target(&self) -> ObjectTarget {
        match self {
            ClusterAccessor::SelfManaged(_) | ClusterAccessor::Unmanaged(_) => {
                ObjectTarget::of::<OCICluster>(self.namespace(), self.name())
            }
            ClusterAccessor::ExternallyManaged(_) => {
                ObjectTarget::of::<OCIManagedCluster>(self.namespace(), self.name())
            }
        }
    }

    pub fn compartment_id(&self) -> &str {
        on_cluster!(self, c => &c.spec.compartment_id)
    }

    /// `spec.region`, `None` when unset or blank
    pub fn region(&self) -> Option<&str> {
        on_cluster!(self, c => c.spec.region.as_deref()).filter(|region| !region.is_empty())
    }

    pub fn resource_identifier(&self) -> &str {
        on_cluster!(self, c => &c.spec.oci_resource_identifier)
    }

    /// user tags with the provenance tags of the cluster on top
    pub fn freeform_tags(&self) -> FreeformTags {
        let base = on_cluster!(self, c => c.spec.freeform_tags.as_ref());

        merge_with_cluster_tags(base, self.resource_identifier())
    }

    pub fn defined_tags(&self) -> DefinedTags {
        copy_defined_tags(on_cluster!(self, c => c.spec.defined_tags.as_ref()))
    }

    pub fn network_spec(&self) -> &NetworkSpec {
        on_cluster!(self, c => &c.spec.network_spec)
    }

    pub fn network_spec_mut(&mut self) -> &mut NetworkSpec {
        on_cluster!(self, c => &mut c.spec.network_spec)
    }

    pub fn subnet(&self, role: Role) -> Option<&Subnet> {
        self.network_spec().subnet(role)
    }

    pub fn nsg(&self, role: Role) -> Option<&Nsg> {
        self.network_spec().nsg(role)
    }

    /// Whether the provider creates and deletes the network of this cluster.
    pub fn is_network_managed(&self) -> bool {
        !matches!(self, ClusterAccessor::Unmanaged(_))
            && !self.network_spec().skip_network_management
    }

    pub fn status(&self) -> Option<&OCIClusterStatus> {
        on_cluster!(self, c => c.status.as_ref())
    }

    pub fn status_mut(&mut self) -> &mut OCIClusterStatus {
        on_cluster!(self, c => c.status.get_or_insert_with(OCIClusterStatus::default))
    }

    pub fn control_plane_endpoint(&self) -> Option<&ApiEndpoint> {
        on_cluster!(self, c => c.spec.control_plane_endpoint.as_ref())
    }

    pub fn set_control_plane_endpoint(&mut self, endpoint: ApiEndpoint) {
        on_cluster!(self, c => c.spec.control_plane_endpoint = Some(endpoint))
    }

    /// API server load balancer, only self managed clusters have one
    pub fn api_server_load_balancer(&self) -> Option<&LoadBalancer> {
        match self {
            ClusterAccessor::SelfManaged(c) => {
                c.spec.network_spec.api_server_load_balancer.as_ref()
            }
            ClusterAccessor::Unmanaged(_) | ClusterAccessor::ExternallyManaged(_) => None,
        }
    }

    pub fn api_server_load_balancer_mut(&mut self) -> Option<&mut LoadBalancer> {
        match self {
            ClusterAccessor::SelfManaged(c) => Some(
                c.spec
                    .network_spec
                    .api_server_load_balancer
                    .get_or_insert_with(LoadBalancer::default),
            ),
            ClusterAccessor::Unmanaged(_) | ClusterAccessor::ExternallyManaged(_) => None,
        }
    }
}
