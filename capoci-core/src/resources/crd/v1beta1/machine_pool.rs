use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::conditions::{Condition, Conditions};

#[skip_serializing_none]
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "OCIMachinePool",
    namespaced,
    status = "OCIMachinePoolStatus",
    derive = "Default"
)]
pub struct OCIMachinePoolSpec {
    /// `oci://<instance pool id>`
    #[serde(rename = "providerID")]
    pub provider_id: Option<String>,
    /// provider ids of the running instances of the pool
    #[serde(default, rename = "providerIDList")]
    pub provider_id_list: Vec<String>,
    #[serde(default)]
    pub instance_configuration: InstanceConfiguration,
    pub min_size: Option<i32>,
    pub max_size: Option<i32>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfiguration {
    pub shape: Option<String>,
    pub shape_config: Option<ShapeConfig>,
    /// boot image of the instances
    pub image_id: Option<String>,
    #[serde(rename = "bootVolumeSizeInGBs")]
    pub boot_volume_size_in_gbs: Option<i64>,
    /// extra instance metadata, `user_data` is always overwritten with the bootstrap data
    pub metadata: Option<BTreeMap<String, String>>,
    pub assign_public_ip: Option<bool>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShapeConfig {
    pub ocpus: Option<String>,
    #[serde(rename = "memoryInGBs")]
    pub memory_in_gbs: Option<String>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OCIMachinePoolStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub replicas: i32,
    pub lifecycle_state: Option<String>,
    pub instance_configuration_id: Option<String>,
    /// terminal problem that requires operator intervention
    pub failure_reason: Option<String>,
    pub failure_message: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Conditions for OCIMachinePoolStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl OCIMachinePoolStatus {
    pub fn has_failed(&self) -> bool {
        self.failure_reason.is_some() || self.failure_message.is_some()
    }
}
