use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// network is managed outside of the provider, nothing gets created or deleted
    #[serde(default)]
    pub skip_network_management: bool,
    #[serde(default)]
    pub vcn: Vcn,
    pub api_server_load_balancer: Option<LoadBalancer>,
    pub vcn_peering: Option<VcnPeering>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vcn {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub cidr: Option<String>,
    pub internet_gateway_id: Option<String>,
    pub nat_gateway_id: Option<String>,
    pub service_gateway_id: Option<String>,
    pub public_route_table_id: Option<String>,
    pub private_route_table_id: Option<String>,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default)]
    pub network_security_groups: Vec<Nsg>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
pub enum Role {
    #[serde(rename = "control-plane-endpoint")]
    ControlPlaneEndpoint,
    #[serde(rename = "worker")]
    Worker,
    #[serde(rename = "pod")]
    Pod,
    #[serde(rename = "service-lb")]
    ServiceLoadBalancer,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::ControlPlaneEndpoint => f.write_str("control-plane-endpoint"),
            Role::Worker => f.write_str("worker"),
            Role::Pod => f.write_str("pod"),
            Role::ServiceLoadBalancer => f.write_str("service-lb"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubnetType {
    #[default]
    Private,
    Public,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub role: Role,
    pub id: Option<String>,
    pub name: String,
    pub cidr: String,
    #[serde(default, rename = "type")]
    pub type_: SubnetType,
    pub security_list: Option<SecurityList>,
}

impl Subnet {
    pub fn is_private(&self) -> bool {
        self.type_ == SubnetType::Private
    }
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityList {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub ingress_rules: Vec<IngressSecurityRule>,
    #[serde(default)]
    pub egress_rules: Vec<EgressSecurityRule>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Nsg {
    pub role: Role,
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub ingress_rules: Vec<IngressSecurityRule>,
    #[serde(default)]
    pub egress_rules: Vec<EgressSecurityRule>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointType {
    #[default]
    CidrBlock,
    ServiceCidrBlock,
    /// source or destination is the name of another NSG of the same cluster
    NetworkSecurityGroup,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortRange {
    pub min: i32,
    pub max: i32,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortOptions {
    pub destination_port_range: Option<PortRange>,
    pub source_port_range: Option<PortRange>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IcmpOptions {
    #[serde(rename = "type")]
    pub type_: i32,
    pub code: Option<i32>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressSecurityRule {
    pub description: Option<String>,
    /// protocol number (6 for tcp, 17 for udp, 1 for icmp) or "all"
    pub protocol: String,
    #[serde(default)]
    pub source_type: EndpointType,
    pub source: String,
    #[serde(default)]
    pub is_stateless: bool,
    pub tcp_options: Option<PortOptions>,
    pub udp_options: Option<PortOptions>,
    pub icmp_options: Option<IcmpOptions>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressSecurityRule {
    pub description: Option<String>,
    pub protocol: String,
    #[serde(default)]
    pub destination_type: EndpointType,
    pub destination: String,
    #[serde(default)]
    pub is_stateless: bool,
    pub tcp_options: Option<PortOptions>,
    pub udp_options: Option<PortOptions>,
    pub icmp_options: Option<IcmpOptions>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    pub name: Option<String>,
    pub load_balancer_id: Option<String>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VcnPeering {
    pub drg: Option<Drg>,
    /// CIDRs of peered networks routed through the DRG
    #[serde(default)]
    pub peer_route_rules: Vec<PeerRouteRule>,
    #[serde(default)]
    pub remote_peering_connections: Vec<RemotePeeringConnection>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Drg {
    /// create and delete the DRG, otherwise `id` has to point to an existing one
    #[serde(default)]
    pub manage: bool,
    pub name: Option<String>,
    pub id: Option<String>,
    pub vcn_attachment_id: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeerRouteRule {
    pub vcn_cidr_range: String,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemotePeeringConnection {
    /// also create the peer side of the connection in the peer region
    #[serde(default)]
    pub managed_remote: bool,
    /// region name or region key of the peer
    pub peer_region_name: String,
    pub peer_drg_id: Option<String>,
    pub rpc_connection_id: Option<String>,
    pub peer_rpc_connection_id: Option<String>,
}

impl NetworkSpec {
    pub fn subnet(&self, role: Role) -> Option<&Subnet> {
        self.vcn.subnets.iter().find(|s| s.role == role)
    }

    pub fn nsg(&self, role: Role) -> Option<&Nsg> {
        self.vcn
            .network_security_groups
            .iter()
            .find(|n| n.role == role)
    }

    pub fn is_all_subnets_private(&self) -> bool {
        self.vcn.subnets.iter().all(Subnet::is_private)
    }

    pub fn is_all_subnets_public(&self) -> bool {
        self.vcn.subnets.iter().all(|s| !s.is_private())
    }

    pub fn drg(&self) -> Option<&Drg> {
        self.vcn_peering.as_ref().and_then(|p| p.drg.as_ref())
    }

    pub fn drg_mut(&mut self) -> Option<&mut Drg> {
        self.vcn_peering.as_mut().and_then(|p| p.drg.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(role: Role, type_: SubnetType) -> Subnet {
        Subnet {
            role,
            id: None,
            name: role.to_string(),
            cidr: "10.0.0.0/24".to_owned(),
            type_,
            security_list: None,
        }
    }

    #[test]
    fn subnets_are_looked_up_by_role() {
        let mut spec = NetworkSpec::default();
        spec.vcn.subnets = vec![
            subnet(Role::Worker, SubnetType::Private),
            subnet(Role::ControlPlaneEndpoint, SubnetType::Public),
        ];

        assert_eq!(
            spec.subnet(Role::ControlPlaneEndpoint).unwrap().name,
            "control-plane-endpoint"
        );
        assert!(spec.subnet(Role::Pod).is_none());
        assert!(!spec.is_all_subnets_private());
        assert!(!spec.is_all_subnets_public());
    }

    #[test]
    fn role_and_type_use_wire_names() {
        let serialized = serde_json::to_value(subnet(Role::ServiceLoadBalancer, SubnetType::Public))
            .unwrap();

        assert_eq!(serialized["role"], "service-lb");
        assert_eq!(serialized["type"], "public");
    }

    #[test]
    fn rule_endpoint_types_use_screaming_case() {
        let rule: IngressSecurityRule = serde_json::from_value(serde_json::json!({
            "protocol": "6",
            "sourceType": "NETWORK_SECURITY_GROUP",
            "source": "worker",
        }))
        .unwrap();

        assert_eq!(rule.source_type, EndpointType::NetworkSecurityGroup);
        assert!(!rule.is_stateless);
    }
}
