use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::conditions::{Condition, Conditions};

pub mod cluster;
pub mod machine_pool;
pub mod managed_cluster;
pub mod managed_control_plane;
pub mod network;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub host: String,
    pub port: i32,
}

impl ApiEndpoint {
    pub fn is_zero(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomainSpec {
    /// whether control plane machines may be placed in this failure domain
    #[serde(default)]
    pub control_plane: bool,
    pub attributes: Option<BTreeMap<String, String>>,
}

pub type FailureDomains = BTreeMap<String, FailureDomainSpec>;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OciAvailabilityDomain {
    pub name: String,
    #[serde(default)]
    pub fault_domains: Vec<String>,
}

/// status shared by every cluster flavor
#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OCIClusterStatus {
    pub failure_domains: Option<FailureDomains>,
    /// availability domains of the region keyed by their name
    pub availability_domains: Option<BTreeMap<String, OciAvailabilityDomain>>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Conditions for OCIClusterStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}
