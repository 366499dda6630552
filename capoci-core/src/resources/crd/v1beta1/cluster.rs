use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::tags::{DefinedTags, FreeformTags};

use super::{network::NetworkSpec, ApiEndpoint, OCIClusterStatus};

/// Infrastructure of a cluster whose control plane runs on machines of its own.
#[skip_serializing_none]
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "OCICluster",
    namespaced,
    status = "OCIClusterStatus",
    derive = "Default"
)]
pub struct OCIClusterSpec {
    /// unique identifier stamped on every cloud resource of the cluster, immutable
    #[serde(default)]
    pub oci_resource_identifier: String,
    /// compartment all resources land in, immutable
    #[serde(default)]
    pub compartment_id: String,
    /// region of the cluster, the manager default is used when unset, immutable
    pub region: Option<String>,
    #[serde(default)]
    pub network_spec: NetworkSpec,
    pub freeform_tags: Option<FreeformTags>,
    pub defined_tags: Option<DefinedTags>,
    pub control_plane_endpoint: Option<ApiEndpoint>,
}
