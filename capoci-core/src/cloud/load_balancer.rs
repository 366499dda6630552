use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::tags::{DefinedTags, FreeformTags};

use super::{network::ResourceDetails, CloudResult};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IpAddress {
    pub ip_address: String,
    pub is_public: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkLoadBalancer {
    pub id: String,
    pub display_name: String,
    pub lifecycle_state: String,
    pub ip_addresses: Vec<IpAddress>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

impl_tagged!(NetworkLoadBalancer);

/// a TCP pass-through listener with a single backend set
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateNetworkLoadBalancerDetails {
    pub details: ResourceDetails,
    pub subnet_id: String,
    pub nsg_ids: Vec<String>,
    pub is_private: bool,
    pub listener_port: i32,
    pub backend_set_name: String,
}

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait LoadBalancerClient: Send + Sync {
    async fn get_network_load_balancer(&self, id: &str) -> CloudResult<NetworkLoadBalancer>;
    async fn list_network_load_balancers(
        &self,
        compartment_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<NetworkLoadBalancer>>;
    async fn create_network_load_balancer(
        &self,
        details: CreateNetworkLoadBalancerDetails,
    ) -> CloudResult<NetworkLoadBalancer>;
    async fn delete_network_load_balancer(&self, id: &str) -> CloudResult<()>;
}
