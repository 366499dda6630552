use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::tags::{DefinedTags, FreeformTags};

use super::{network::NetworkSpec, ApiEndpoint, OCIClusterStatus};

/// Infrastructure of a cluster whose control plane is run by the container engine.
#[skip_serializing_none]
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "OCIManagedCluster",
    namespaced,
    status = "OCIClusterStatus",
    derive = "Default"
)]
pub struct OCIManagedClusterSpec {
    #[serde(default)]
    pub oci_resource_identifier: String,
    #[serde(default)]
    pub compartment_id: String,
    pub region: Option<String>,
    #[serde(default)]
    pub network_spec: NetworkSpec,
    pub freeform_tags: Option<FreeformTags>,
    pub defined_tags: Option<DefinedTags>,
    /// copied from the managed control plane once it's reachable
    pub control_plane_endpoint: Option<ApiEndpoint>,
}
