use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use super::CloudResult;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AvailabilityDomain {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaultDomain {
    pub name: String,
    pub availability_domain: String,
}

/// e.g. `us-phoenix-1` with the key `PHX`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    pub key: String,
    pub name: String,
}

#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn list_availability_domains(
        &self,
        compartment_id: &str,
    ) -> CloudResult<Vec<AvailabilityDomain>>;
    async fn list_fault_domains(
        &self,
        compartment_id: &str,
        availability_domain: &str,
    ) -> CloudResult<Vec<FaultDomain>>;
    async fn list_regions(&self) -> CloudResult<Vec<Region>>;
}
