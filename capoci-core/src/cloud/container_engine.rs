use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::tags::{DefinedTags, FreeformTags};

use super::CloudResult;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterEndpoints {
    pub kubernetes: Option<String>,
    /// `host:port` of the public API endpoint
    pub public_endpoint: Option<String>,
    pub private_endpoint: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub vcn_id: String,
    pub kubernetes_version: String,
    pub lifecycle_state: String,
    pub endpoints: Option<ClusterEndpoints>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterEndpointConfig {
    pub subnet_id: String,
    pub nsg_ids: Vec<String>,
    pub is_public_ip_enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateClusterDetails {
    pub name: String,
    pub compartment_id: String,
    pub vcn_id: String,
    pub kubernetes_version: String,
    pub endpoint_config: ClusterEndpointConfig,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkRequestResource {
    pub identifier: String,
    pub entity_type: String,
    pub action_type: String,
}

/// asynchronous operation started by a create or delete call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkRequest {
    pub id: String,
    pub status: String,
    pub resources: Vec<WorkRequestResource>,
}

impl super::Tagged for Cluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn freeform_tags(&self) -> &FreeformTags {
        &self.freeform_tags
    }
}

/// Managed Kubernetes control planes.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ContainerEngineClient: Send + Sync {
    async fn get_cluster(&self, id: &str) -> CloudResult<Cluster>;
    async fn list_clusters(&self, compartment_id: &str, name: &str) -> CloudResult<Vec<Cluster>>;
    /// returns the id of the work request tracking the creation
    async fn create_cluster(&self, details: CreateClusterDetails) -> CloudResult<String>;
    async fn get_work_request(&self, id: &str) -> CloudResult<WorkRequest>;
    async fn delete_cluster(&self, id: &str) -> CloudResult<String>;
    /// kubeconfig document with the server address and CA data of the cluster
    async fn create_kubeconfig(&self, cluster_id: &str) -> CloudResult<String>;
}
