use async_trait::async_trait;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::{
    resources::crd::v1beta1::network::{EgressSecurityRule, IngressSecurityRule},
    tags::{DefinedTags, FreeformTags},
};

use super::CloudResult;

/// tags and name every created network resource receives
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceDetails {
    pub compartment_id: String,
    pub display_name: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vcn {
    pub id: String,
    pub display_name: String,
    pub cidr_block: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateDetails {
    pub display_name: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gateway {
    pub id: String,
    pub display_name: String,
    pub vcn_id: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceGateway {
    pub id: String,
    pub display_name: String,
    pub vcn_id: String,
    pub service_ids: Vec<String>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

/// a service reachable through a service gateway
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub cidr_block: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkSecurityGroup {
    pub id: String,
    pub display_name: String,
    pub vcn_id: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SecurityRule {
    Ingress(IngressSecurityRule),
    Egress(EgressSecurityRule),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NsgRule {
    pub id: String,
    pub rule: SecurityRule,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SecurityList {
    pub id: String,
    pub display_name: String,
    pub vcn_id: String,
    pub ingress_rules: Vec<IngressSecurityRule>,
    pub egress_rules: Vec<EgressSecurityRule>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SecurityListRules {
    pub ingress_rules: Vec<IngressSecurityRule>,
    pub egress_rules: Vec<EgressSecurityRule>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteDestinationType {
    #[default]
    CidrBlock,
    ServiceCidrBlock,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteRule {
    pub destination: String,
    pub destination_type: RouteDestinationType,
    pub network_entity_id: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteTable {
    pub id: String,
    pub display_name: String,
    pub vcn_id: String,
    pub route_rules: Vec<RouteRule>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subnet {
    pub id: String,
    pub display_name: String,
    pub vcn_id: String,
    pub cidr_block: String,
    pub route_table_id: String,
    pub security_list_ids: Vec<String>,
    pub prohibit_public_ip_on_vnic: bool,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateSubnetDetails {
    pub details: ResourceDetails,
    pub vcn_id: String,
    pub cidr_block: String,
    pub route_table_id: String,
    pub security_list_ids: Vec<String>,
    pub prohibit_public_ip_on_vnic: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateSubnetDetails {
    pub update: UpdateDetails,
    pub route_table_id: String,
    pub security_list_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Drg {
    pub id: String,
    pub display_name: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrgAttachment {
    pub id: String,
    pub display_name: String,
    pub drg_id: String,
    pub vcn_id: String,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemotePeeringConnection {
    pub id: String,
    pub display_name: String,
    pub drg_id: String,
    /// e.g. NEW, PENDING or PEERED
    pub peering_status: String,
    pub peer_id: Option<String>,
    pub freeform_tags: FreeformTags,
    pub defined_tags: DefinedTags,
}

impl RemotePeeringConnection {
    pub fn is_peered(&self) -> bool {
        self.peering_status == "PEERED"
    }
}

impl_tagged!(
    Vcn,
    Gateway,
    ServiceGateway,
    NetworkSecurityGroup,
    SecurityList,
    RouteTable,
    Subnet,
    Drg,
    DrgAttachment,
    RemotePeeringConnection,
);

/// Virtual cloud network service.
///
/// List calls filter by display name server side where the service supports it, callers
/// still have to verify ownership through the provenance tags.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait VirtualNetworkClient: Send + Sync {
    async fn get_vcn(&self, id: &str) -> CloudResult<Vcn>;
    async fn list_vcns(&self, compartment_id: &str, display_name: &str) -> CloudResult<Vec<Vcn>>;
    async fn create_vcn(&self, details: ResourceDetails, cidr_block: String) -> CloudResult<Vcn>;
    async fn update_vcn(&self, id: &str, update: UpdateDetails) -> CloudResult<Vcn>;
    async fn delete_vcn(&self, id: &str) -> CloudResult<()>;

    async fn get_internet_gateway(&self, id: &str) -> CloudResult<Gateway>;
    async fn list_internet_gateways(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<Gateway>>;
    async fn create_internet_gateway(
        &self,
        details: ResourceDetails,
        vcn_id: String,
    ) -> CloudResult<Gateway>;
    async fn delete_internet_gateway(&self, id: &str) -> CloudResult<()>;

    async fn get_nat_gateway(&self, id: &str) -> CloudResult<Gateway>;
    async fn list_nat_gateways(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<Gateway>>;
    async fn create_nat_gateway(
        &self,
        details: ResourceDetails,
        vcn_id: String,
    ) -> CloudResult<Gateway>;
    async fn delete_nat_gateway(&self, id: &str) -> CloudResult<()>;

    async fn list_services(&self) -> CloudResult<Vec<Service>>;
    async fn get_service_gateway(&self, id: &str) -> CloudResult<ServiceGateway>;
    async fn list_service_gateways(
        &self,
        compartment_id: &str,
        vcn_id: &str,
    ) -> CloudResult<Vec<ServiceGateway>>;
    async fn create_service_gateway(
        &self,
        details: ResourceDetails,
        vcn_id: String,
        service_ids: Vec<String>,
    ) -> CloudResult<ServiceGateway>;
    async fn delete_service_gateway(&self, id: &str) -> CloudResult<()>;

    async fn get_network_security_group(&self, id: &str) -> CloudResult<NetworkSecurityGroup>;
    async fn list_network_security_groups(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<NetworkSecurityGroup>>;
    async fn create_network_security_group(
        &self,
        details: ResourceDetails,
        vcn_id: String,
    ) -> CloudResult<NetworkSecurityGroup>;
    async fn update_network_security_group(
        &self,
        id: &str,
        update: UpdateDetails,
    ) -> CloudResult<NetworkSecurityGroup>;
    async fn delete_network_security_group(&self, id: &str) -> CloudResult<()>;
    async fn list_network_security_group_rules(&self, nsg_id: &str) -> CloudResult<Vec<NsgRule>>;
    async fn add_network_security_group_rules(
        &self,
        nsg_id: &str,
        rules: Vec<SecurityRule>,
    ) -> CloudResult<()>;
    async fn remove_network_security_group_rules(
        &self,
        nsg_id: &str,
        rule_ids: Vec<String>,
    ) -> CloudResult<()>;

    async fn get_security_list(&self, id: &str) -> CloudResult<SecurityList>;
    async fn list_security_lists(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<SecurityList>>;
    async fn create_security_list(
        &self,
        details: ResourceDetails,
        vcn_id: String,
        rules: SecurityListRules,
    ) -> CloudResult<SecurityList>;
    async fn update_security_list(
        &self,
        id: &str,
        update: UpdateDetails,
        rules: SecurityListRules,
    ) -> CloudResult<SecurityList>;
    async fn delete_security_list(&self, id: &str) -> CloudResult<()>;

    async fn get_route_table(&self, id: &str) -> CloudResult<RouteTable>;
    async fn list_route_tables(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<RouteTable>>;
    async fn create_route_table(
        &self,
        details: ResourceDetails,
        vcn_id: String,
        route_rules: Vec<RouteRule>,
    ) -> CloudResult<RouteTable>;
    async fn update_route_table(
        &self,
        id: &str,
        update: UpdateDetails,
        route_rules: Vec<RouteRule>,
    ) -> CloudResult<RouteTable>;
    async fn delete_route_table(&self, id: &str) -> CloudResult<()>;

    async fn get_subnet(&self, id: &str) -> CloudResult<Subnet>;
    async fn list_subnets(
        &self,
        compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<Subnet>>;
    async fn create_subnet(&self, details: CreateSubnetDetails) -> CloudResult<Subnet>;
    async fn update_subnet(&self, id: &str, update: UpdateSubnetDetails) -> CloudResult<Subnet>;
    async fn delete_subnet(&self, id: &str) -> CloudResult<()>;

    async fn get_drg(&self, id: &str) -> CloudResult<Drg>;
    async fn list_drgs(&self, compartment_id: &str) -> CloudResult<Vec<Drg>>;
    async fn create_drg(&self, details: ResourceDetails) -> CloudResult<Drg>;
    async fn delete_drg(&self, id: &str) -> CloudResult<()>;

    async fn get_drg_attachment(&self, id: &str) -> CloudResult<DrgAttachment>;
    async fn list_drg_attachments(
        &self,
        compartment_id: &str,
        drg_id: &str,
        vcn_id: &str,
    ) -> CloudResult<Vec<DrgAttachment>>;
    async fn create_drg_attachment(
        &self,
        details: ResourceDetails,
        drg_id: String,
        vcn_id: String,
    ) -> CloudResult<DrgAttachment>;
    async fn delete_drg_attachment(&self, id: &str) -> CloudResult<()>;

    async fn get_remote_peering_connection(&self, id: &str)
        -> CloudResult<RemotePeeringConnection>;
    async fn list_remote_peering_connections(
        &self,
        compartment_id: &str,
        drg_id: &str,
    ) -> CloudResult<Vec<RemotePeeringConnection>>;
    async fn create_remote_peering_connection(
        &self,
        details: ResourceDetails,
        drg_id: String,
    ) -> CloudResult<RemotePeeringConnection>;
    async fn connect_remote_peering_connections(
        &self,
        id: &str,
        peer_id: &str,
        peer_region_name: &str,
    ) -> CloudResult<()>;
    async fn delete_remote_peering_connection(&self, id: &str) -> CloudResult<()>;
}
