use std::borrow::Cow;

use ipnet::Ipv4Net;
use thiserror::Error;

use crate::resources::crd::v1beta1::network::{
    EgressSecurityRule, EndpointType, IcmpOptions, IngressSecurityRule, NetworkSpec, Nsg,
    PortOptions, PortRange, Role, Subnet, SubnetType,
};

pub const VCN_DEFAULT_CIDR: &str = "10.0.0.0/16";
pub const CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR: &str = "10.0.0.8/29";
pub const WORKER_SUBNET_DEFAULT_CIDR: &str = "10.0.64.0/20";
pub const SERVICE_LOAD_BALANCER_DEFAULT_CIDR: &str = "10.0.0.32/27";
pub const POD_DEFAULT_CIDR: &str = "10.0.4.0/24";

pub const CONTROL_PLANE_ENDPOINT_DEFAULT_NAME: &str = "control-plane-endpoint";
pub const WORKER_DEFAULT_NAME: &str = "worker";
pub const SERVICE_LB_DEFAULT_NAME: &str = "service-lb";
pub const POD_DEFAULT_NAME: &str = "pod";

pub const SERVICE_GATEWAY_NAME: &str = "service-gateway";
pub const NAT_GATEWAY_NAME: &str = "nat-gateway";
pub const INTERNET_GATEWAY_NAME: &str = "internet-gateway";
pub const PUBLIC_ROUTE_TABLE_NAME: &str = "public-route-table";
pub const PRIVATE_ROUTE_TABLE_NAME: &str = "private-route-table";
pub const OSN_SERVICES_SUFFIX: &str = "-services-in-oracle-services-network";

pub const ANYWHERE_CIDR: &str = "0.0.0.0/0";

const TCP: &str = "6";
const ICMP: &str = "1";
const ALL: &str = "all";

const OKE_CONTROL_PLANE_PORT: i32 = 12250;
const KUBELET_PORT: i32 = 10250;
const NODE_PORT_MIN: i32 = 30000;
const NODE_PORT_MAX: i32 = 32767;

#[derive(Debug, Error, PartialEq)]
pub enum NetworkValidationError {
    #[error("'{}' is not a valid IPv4 CIDR block!", .0)]
    InvalidCidr(Cow<'static, str>),
    #[error("Subnet '{}' ({}) doesn't fit in the VCN CIDR block {}!", .0, .1, .2)]
    SubnetOutsideVcn(String, Ipv4Net, Ipv4Net),
    #[error("Subnets '{}' and '{}' have overlapping CIDR blocks!", .0, .1)]
    OverlappingSubnets(String, String),
}

/// Fills in the default topology for every part of the network that was left empty.
///
/// Nothing changes when network management is skipped.
pub fn apply_network_defaults(spec: &mut NetworkSpec, api_server_port: i32) {
    if spec.skip_network_management {
        return;
    }

    if spec.vcn.cidr.is_none() {
        spec.vcn.cidr = Some(VCN_DEFAULT_CIDR.to_owned());
    }

    if spec.vcn.subnets.is_empty() {
        spec.vcn.subnets = default_subnets();
    }

    if spec.vcn.network_security_groups.is_empty() {
        spec.vcn.network_security_groups = default_nsgs(api_server_port);
    }
}

pub fn default_subnets() -> Vec<Subnet> {
    [
        (
            Role::ControlPlaneEndpoint,
            CONTROL_PLANE_ENDPOINT_DEFAULT_NAME,
            CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR,
            SubnetType::Public,
        ),
        (
            Role::ServiceLoadBalancer,
            SERVICE_LB_DEFAULT_NAME,
            SERVICE_LOAD_BALANCER_DEFAULT_CIDR,
            SubnetType::Public,
        ),
        (
            Role::Worker,
            WORKER_DEFAULT_NAME,
            WORKER_SUBNET_DEFAULT_CIDR,
            SubnetType::Private,
        ),
        (
            Role::Pod,
            POD_DEFAULT_NAME,
            POD_DEFAULT_CIDR,
            SubnetType::Private,
        ),
    ]
    .into_iter()
    .map(|(role, name, cidr, type_)| Subnet {
        role,
        id: None,
        name: name.to_owned(),
        cidr: cidr.to_owned(),
        type_,
        security_list: None,
    })
    .collect()
}

pub fn default_nsgs(api_server_port: i32) -> Vec<Nsg> {
    vec![
        Nsg {
            role: Role::ControlPlaneEndpoint,
            id: None,
            name: CONTROL_PLANE_ENDPOINT_DEFAULT_NAME.to_owned(),
            ingress_rules: vec![
                tcp_ingress(
                    "Kubernetes worker to Kubernetes API endpoint communication.",
                    WORKER_SUBNET_DEFAULT_CIDR,
                    api_server_port,
                ),
                tcp_ingress(
                    "Kubernetes worker to Kubernetes API endpoint communication.",
                    WORKER_SUBNET_DEFAULT_CIDR,
                    OKE_CONTROL_PLANE_PORT,
                ),
                path_discovery_ingress(WORKER_SUBNET_DEFAULT_CIDR),
                tcp_ingress(
                    "Pod to Kubernetes API endpoint communication.",
                    POD_DEFAULT_CIDR,
                    api_server_port,
                ),
                tcp_ingress(
                    "Pod to Kubernetes API endpoint communication.",
                    POD_DEFAULT_CIDR,
                    OKE_CONTROL_PLANE_PORT,
                ),
                tcp_ingress(
                    "External access to Kubernetes API endpoint.",
                    ANYWHERE_CIDR,
                    api_server_port,
                ),
            ],
            egress_rules: vec![
                tcp_egress(
                    "Allow Kubernetes API endpoint to communicate with worker nodes.",
                    WORKER_SUBNET_DEFAULT_CIDR,
                    KUBELET_PORT,
                ),
                path_discovery_egress(WORKER_SUBNET_DEFAULT_CIDR),
                all_egress(
                    "Allow Kubernetes API endpoint to communicate with pods.",
                    POD_DEFAULT_CIDR,
                ),
            ],
        },
        Nsg {
            role: Role::Worker,
            id: None,
            name: WORKER_DEFAULT_NAME.to_owned(),
            ingress_rules: vec![
                tcp_ingress(
                    "Allow Kubernetes API endpoint to communicate with worker nodes.",
                    CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR,
                    KUBELET_PORT,
                ),
                path_discovery_ingress(ANYWHERE_CIDR),
                IngressSecurityRule {
                    description: Some("Load Balancer to Worker nodes node ports.".to_owned()),
                    protocol: TCP.to_owned(),
                    source: SERVICE_LOAD_BALANCER_DEFAULT_CIDR.to_owned(),
                    tcp_options: Some(port_range(NODE_PORT_MIN, NODE_PORT_MAX)),
                    ..Default::default()
                },
            ],
            egress_rules: vec![
                all_egress("Allow worker nodes to access pods.", POD_DEFAULT_CIDR),
                path_discovery_egress(ANYWHERE_CIDR),
                tcp_egress(
                    "Kubernetes worker to Kubernetes API endpoint communication.",
                    CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR,
                    api_server_port,
                ),
                tcp_egress(
                    "Kubernetes worker to Kubernetes API endpoint communication.",
                    CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR,
                    OKE_CONTROL_PLANE_PORT,
                ),
            ],
        },
        Nsg {
            role: Role::ServiceLoadBalancer,
            id: None,
            name: SERVICE_LB_DEFAULT_NAME.to_owned(),
            ingress_rules: vec![
                tcp_ingress("Accept http traffic on port 80", ANYWHERE_CIDR, 80),
                tcp_ingress("Accept https traffic on port 443", ANYWHERE_CIDR, 443),
            ],
            egress_rules: vec![EgressSecurityRule {
                description: Some("Load Balancer to Worker nodes node ports.".to_owned()),
                protocol: TCP.to_owned(),
                destination: WORKER_SUBNET_DEFAULT_CIDR.to_owned(),
                tcp_options: Some(port_range(NODE_PORT_MIN, NODE_PORT_MAX)),
                ..Default::default()
            }],
        },
        Nsg {
            role: Role::Pod,
            id: None,
            name: POD_DEFAULT_NAME.to_owned(),
            ingress_rules: vec![
                all_ingress("Allow worker nodes to access pods.", WORKER_SUBNET_DEFAULT_CIDR),
                all_ingress(
                    "Allow Kubernetes API endpoint to communicate with pods.",
                    CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR,
                ),
                all_ingress("Allow pods to communicate with other pods.", POD_DEFAULT_CIDR),
            ],
            egress_rules: vec![
                all_egress("Allow pods to communicate with other pods.", POD_DEFAULT_CIDR),
                tcp_egress(
                    "Pod to Kubernetes API endpoint communication.",
                    CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR,
                    api_server_port,
                ),
                tcp_egress(
                    "Pod to Kubernetes API endpoint communication.",
                    CONTROL_PLANE_ENDPOINT_SUBNET_DEFAULT_CIDR,
                    OKE_CONTROL_PLANE_PORT,
                ),
            ],
        },
    ]
}

/// Checks that every subnet CIDR is well formed, inside the VCN block and disjoint from the others.
pub fn validate_network(spec: &NetworkSpec) -> Result<(), NetworkValidationError> {
    let vcn_cidr = parse_cidr(spec.vcn.cidr.as_deref().unwrap_or(VCN_DEFAULT_CIDR))?;

    let mut parsed: Vec<(&str, Ipv4Net)> = Vec::with_capacity(spec.vcn.subnets.len());
    for subnet in &spec.vcn.subnets {
        let cidr = parse_cidr(&subnet.cidr)?;

        if !vcn_cidr.contains(&cidr) {
            return Err(NetworkValidationError::SubnetOutsideVcn(
                subnet.name.clone(),
                cidr,
                vcn_cidr,
            ));
        }

        if let Some((other, _)) = parsed
            .iter()
            .find(|(_, other)| other.contains(&cidr) || cidr.contains(other))
        {
            return Err(NetworkValidationError::OverlappingSubnets(
                (*other).to_owned(),
                subnet.name.clone(),
            ));
        }

        parsed.push((&subnet.name, cidr));
    }

    Ok(())
}

fn parse_cidr(cidr: &str) -> Result<Ipv4Net, NetworkValidationError> {
    cidr.parse()
        .map_err(|_| NetworkValidationError::InvalidCidr(cidr.to_owned().into()))
}

fn port_range(min: i32, max: i32) -> PortOptions {
    PortOptions {
        destination_port_range: Some(PortRange { min, max }),
        source_port_range: None,
    }
}

fn tcp_ingress(description: &str, source: &str, port: i32) -> IngressSecurityRule {
    IngressSecurityRule {
        description: Some(description.to_owned()),
        protocol: TCP.to_owned(),
        source_type: EndpointType::CidrBlock,
        source: source.to_owned(),
        tcp_options: Some(port_range(port, port)),
        ..Default::default()
    }
}

fn all_ingress(description: &str, source: &str) -> IngressSecurityRule {
    IngressSecurityRule {
        description: Some(description.to_owned()),
        protocol: ALL.to_owned(),
        source: source.to_owned(),
        ..Default::default()
    }
}

fn path_discovery_ingress(source: &str) -> IngressSecurityRule {
    IngressSecurityRule {
        description: Some("Path Discovery.".to_owned()),
        protocol: ICMP.to_owned(),
        source: source.to_owned(),
        icmp_options: Some(IcmpOptions {
            type_: 3,
            code: Some(4),
        }),
        ..Default::default()
    }
}

fn tcp_egress(description: &str, destination: &str, port: i32) -> EgressSecurityRule {
    EgressSecurityRule {
        description: Some(description.to_owned()),
        protocol: TCP.to_owned(),
        destination_type: EndpointType::CidrBlock,
        destination: destination.to_owned(),
        tcp_options: Some(port_range(port, port)),
        ..Default::default()
    }
}

fn all_egress(description: &str, destination: &str) -> EgressSecurityRule {
    EgressSecurityRule {
        description: Some(description.to_owned()),
        protocol: ALL.to_owned(),
        destination: destination.to_owned(),
        ..Default::default()
    }
}

fn path_discovery_egress(destination: &str) -> EgressSecurityRule {
    EgressSecurityRule {
        description: Some("Path Discovery.".to_owned()),
        protocol: ICMP.to_owned(),
        destination: destination.to_owned(),
        icmp_options: Some(IcmpOptions {
            type_: 3,
            code: Some(4),
        }),
        ..Default::default()
    }
}
