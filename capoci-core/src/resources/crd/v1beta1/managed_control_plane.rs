use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::conditions::{Condition, Conditions};

use super::ApiEndpoint;

#[skip_serializing_none]
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "OCIManagedControlPlane",
    namespaced,
    status = "OCIManagedControlPlaneStatus",
    derive = "Default"
)]
pub struct OCIManagedControlPlaneSpec {
    /// container engine cluster id, recorded once the cluster is created or adopted
    pub id: Option<String>,
    /// desired Kubernetes version, e.g. v1.27.2
    pub version: Option<String>,
    pub control_plane_endpoint: Option<ApiEndpoint>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OCIManagedControlPlaneStatus {
    #[serde(default)]
    pub ready: bool,
    /// set once a kubeconfig secret for the cluster exists
    #[serde(default)]
    pub initialized: bool,
    pub lifecycle_state: Option<String>,
    pub version: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_message: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Conditions for OCIManagedControlPlaneStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl OCIManagedControlPlaneStatus {
    pub fn has_failed(&self) -> bool {
        self.failure_reason.is_some() || self.failure_message.is_some()
    }
}
