use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::{
    resources::crd::v1beta1::machine_pool::ShapeConfig,
    tags::{DefinedTags, FreeformTags},
};

use super::{network::ResourceDetails, CloudResult};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Instance {
    pub id: String,
    pub display_name: String,
    pub lifecycle_state: String,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.lifecycle_state == "RUNNING"
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceConfiguration {
    pub id: String,
    pub display_name: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceLaunchDetails {
    pub shape: Option<String>,
    pub shape_config: Option<ShapeConfig>,
    pub image_id: Option<String>,
    pub boot_volume_size_in_gbs: Option<i64>,
    pub subnet_id: String,
    pub nsg_ids: Vec<String>,
    pub assign_public_ip: bool,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstancePool {
    pub id: String,
    pub display_name: String,
    pub size: i32,
    pub lifecycle_state: String,
    pub instance_configuration_id: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlacementConfiguration {
    pub availability_domain: String,
    pub primary_subnet_id: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateInstancePoolDetails {
    pub details: ResourceDetails,
    pub instance_configuration_id: String,
    pub size: i32,
    pub placement_configurations: Vec<PlacementConfiguration>,
}

impl_tagged!(InstanceConfiguration, InstancePool);

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ComputeClient: Send + Sync {
    async fn get_instance(&self, id: &str) -> CloudResult<Instance>;
}

/// Instance configurations and the instance pools launched from them.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ComputeManagementClient: Send + Sync {
    async fn get_instance_configuration(&self, id: &str) -> CloudResult<InstanceConfiguration>;
    async fn list_instance_configurations(
        &self,
        compartment_id: &str,
    ) -> CloudResult<Vec<InstanceConfiguration>>;
    async fn create_instance_configuration(
        &self,
        details: ResourceDetails,
        launch_details: InstanceLaunchDetails,
    ) -> CloudResult<InstanceConfiguration>;
    async fn delete_instance_configuration(&self, id: &str) -> CloudResult<()>;

    async fn get_instance_pool(&self, id: &str) -> CloudResult<InstancePool>;
    async fn list_instance_pools(
        &self,
        compartment_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<InstancePool>>;
    async fn create_instance_pool(
        &self,
        details: CreateInstancePoolDetails,
    ) -> CloudResult<InstancePool>;
    async fn update_instance_pool_size(&self, id: &str, size: i32) -> CloudResult<InstancePool>;
    async fn terminate_instance_pool(&self, id: &str) -> CloudResult<()>;
    /// ids of the instances currently attached to the pool
    async fn list_instance_pool_instances(
        &self,
        compartment_id: &str,
        instance_pool_id: &str,
    ) -> CloudResult<Vec<String>>;
}
