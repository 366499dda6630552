//! In-memory virtual network service keeping every created resource.

use std::sync::Mutex;

use async_trait::async_trait;
use capoci_core::cloud::{
    network::{
        CreateSubnetDetails, Drg, DrgAttachment, Gateway, NetworkSecurityGroup, NsgRule,
        RemotePeeringConnection, ResourceDetails, RouteRule, RouteTable, SecurityList,
        SecurityListRules, SecurityRule, Service, ServiceGateway, Subnet, UpdateDetails,
        UpdateSubnetDetails, Vcn, VirtualNetworkClient,
    },
    CloudError, CloudResult, Tagged,
};

#[derive(Default)]
struct State {
    next_id: usize,
    calls: Vec<String>,
    vcns: Vec<Vcn>,
    internet_gateways: Vec<Gateway>,
    nat_gateways: Vec<Gateway>,
    service_gateways: Vec<ServiceGateway>,
    nsgs: Vec<NetworkSecurityGroup>,
    nsg_rules: Vec<(String, NsgRule)>,
    security_lists: Vec<SecurityList>,
    route_tables: Vec<RouteTable>,
    subnets: Vec<Subnet>,
    drgs: Vec<Drg>,
    drg_attachments: Vec<DrgAttachment>,
    remote_peering_connections: Vec<RemotePeeringConnection>,
}

impl State {
    fn record(&mut self, call: &str) {
        self.calls.push(call.to_owned());
    }

    fn next_id(&mut self, kind: &str) -> String {
        self.next_id += 1;

        format!("ocid1.{kind}.oc1..{:04}", self.next_id)
    }
}

fn get<T: Tagged + Clone>(items: &[T], kind: &'static str, id: &str) -> CloudResult<T> {
    items
        .iter()
        .find(|item| item.id() == id)
        .cloned()
        .ok_or_else(|| CloudError::not_found(kind, id))
}

fn remove<T: Tagged>(items: &mut Vec<T>, kind: &'static str, id: &str) -> CloudResult<()> {
    let before = items.len();
    items.retain(|item| item.id() != id);

    if items.len() == before {
        Err(CloudError::not_found(kind, id))
    } else {
        Ok(())
    }
}

fn update<T: Tagged + Clone>(
    items: &mut [T],
    kind: &'static str,
    id: &str,
    apply: impl FnOnce(&mut T),
) -> CloudResult<T> {
    let item = items
        .iter_mut()
        .find(|item| item.id() == id)
        .ok_or_else(|| CloudError::not_found(kind, id))?;
    apply(item);

    Ok(item.clone())
}

#[derive(Default)]
pub(crate) struct FakeNetwork {
    state: Mutex<State>,
}

impl FakeNetwork {
    fn with_state<R>(&self, call: &str, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        state.record(call);

        f(&mut state)
    }

    /// names of the trait methods called so far, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn insert_vcn(&self, vcn: Vcn) {
        self.state.lock().unwrap().vcns.push(vcn);
    }

    pub(crate) fn insert_rule(&self, nsg_id: &str, rule: NsgRule) {
        self.state
            .lock()
            .unwrap()
            .nsg_rules
            .push((nsg_id.to_owned(), rule));
    }

    pub(crate) fn rules(&self, nsg_id: &str) -> Vec<NsgRule> {
        self.state
            .lock()
            .unwrap()
            .nsg_rules
            .iter()
            .filter(|(nsg, _)| nsg == nsg_id)
            .map(|(_, rule)| rule.clone())
            .collect()
    }

    pub(crate) fn subnet(&self, id: &str) -> Option<Subnet> {
        get(&self.state.lock().unwrap().subnets, "Subnet", id).ok()
    }

    pub(crate) fn remote_peering_connection(&self, id: &str) -> Option<RemotePeeringConnection> {
        get(
            &self.state.lock().unwrap().remote_peering_connections,
            "RemotePeeringConnection",
            id,
        )
        .ok()
    }

    /// no resource is left
    pub(crate) fn is_empty(&self) -> bool {
        let state = self.state.lock().unwrap();

        state.vcns.is_empty()
            && state.internet_gateways.is_empty()
            && state.nat_gateways.is_empty()
            && state.service_gateways.is_empty()
            && state.nsgs.is_empty()
            && state.security_lists.is_empty()
            && state.route_tables.is_empty()
            && state.subnets.is_empty()
            && state.drgs.is_empty()
            && state.drg_attachments.is_empty()
            && state.remote_peering_connections.is_empty()
    }
}

fn named<T: Tagged + Clone>(items: &[T], display_name: &str, filter: impl Fn(&T) -> bool) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.display_name() == display_name && filter(item))
        .cloned()
        .collect()
}

#[async_trait]
impl VirtualNetworkClient for FakeNetwork {
    async fn get_vcn(&self, id: &str) -> CloudResult<Vcn> {
        self.with_state("get_vcn", |s| get(&s.vcns, "Vcn", id))
    }

    async fn list_vcns(&self, _compartment_id: &str, display_name: &str) -> CloudResult<Vec<Vcn>> {
        self.with_state("list_vcns", |s| Ok(named(&s.vcns, display_name, |_| true)))
    }

    async fn create_vcn(&self, details: ResourceDetails, cidr_block: String) -> CloudResult<Vcn> {
        self.with_state("create_vcn", |s| {
            let vcn = Vcn {
                id: s.next_id("vcn"),
                display_name: details.display_name,
                cidr_block,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.vcns.push(vcn.clone());

            Ok(vcn)
        })
    }

    async fn update_vcn(&self, id: &str, update_details: UpdateDetails) -> CloudResult<Vcn> {
        self.with_state("update_vcn", |s| {
            update(&mut s.vcns, "Vcn", id, |vcn| {
                vcn.display_name = update_details.display_name;
                vcn.freeform_tags = update_details.freeform_tags;
                vcn.defined_tags = update_details.defined_tags;
            })
        })
    }

    async fn delete_vcn(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_vcn", |s| remove(&mut s.vcns, "Vcn", id))
    }

    async fn get_internet_gateway(&self, id: &str) -> CloudResult<Gateway> {
        self.with_state("get_internet_gateway", |s| {
            get(&s.internet_gateways, "InternetGateway", id)
        })
    }

    async fn list_internet_gateways(
        &self,
        _compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<Gateway>> {
        self.with_state("list_internet_gateways", |s| {
            Ok(named(&s.internet_gateways, display_name, |g| g.vcn_id == vcn_id))
        })
    }

    async fn create_internet_gateway(
        &self,
        details: ResourceDetails,
        vcn_id: String,
    ) -> CloudResult<Gateway> {
        self.with_state("create_internet_gateway", |s| {
            let gateway = Gateway {
                id: s.next_id("internetgateway"),
                display_name: details.display_name,
                vcn_id,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.internet_gateways.push(gateway.clone());

            Ok(gateway)
        })
    }

    async fn delete_internet_gateway(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_internet_gateway", |s| {
            remove(&mut s.internet_gateways, "InternetGateway", id)
        })
    }

    async fn get_nat_gateway(&self, id: &str) -> CloudResult<Gateway> {
        self.with_state("get_nat_gateway", |s| get(&s.nat_gateways, "NatGateway", id))
    }

    async fn list_nat_gateways(
        &self,
        _compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<Gateway>> {
        self.with_state("list_nat_gateways", |s| {
            Ok(named(&s.nat_gateways, display_name, |g| g.vcn_id == vcn_id))
        })
    }

    async fn create_nat_gateway(
        &self,
        details: ResourceDetails,
        vcn_id: String,
    ) -> CloudResult<Gateway> {
        self.with_state("create_nat_gateway", |s| {
            let gateway = Gateway {
                id: s.next_id("natgateway"),
                display_name: details.display_name,
                vcn_id,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.nat_gateways.push(gateway.clone());

            Ok(gateway)
        })
    }

    async fn delete_nat_gateway(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_nat_gateway", |s| {
            remove(&mut s.nat_gateways, "NatGateway", id)
        })
    }

    async fn list_services(&self) -> CloudResult<Vec<Service>> {
        self.with_state("list_services", |_| {
            Ok(vec![
                Service {
                    id: "ocid1.service.oc1.phx.storage".to_owned(),
                    name: "OCI PHX Object Storage".to_owned(),
                    cidr_block: "oci-phx-objectstorage".to_owned(),
                },
                Service {
                    id: "ocid1.service.oc1.phx.all".to_owned(),
                    name: "All PHX Services In Oracle Services Network".to_owned(),
                    cidr_block: "all-phx-services-in-oracle-services-network".to_owned(),
                },
            ])
        })
    }

    async fn get_service_gateway(&self, id: &str) -> CloudResult<ServiceGateway> {
        self.with_state("get_service_gateway", |s| {
            get(&s.service_gateways, "ServiceGateway", id)
        })
    }

    async fn list_service_gateways(
        &self,
        _compartment_id: &str,
        vcn_id: &str,
    ) -> CloudResult<Vec<ServiceGateway>> {
        self.with_state("list_service_gateways", |s| {
            Ok(s.service_gateways
                .iter()
                .filter(|g| g.vcn_id == vcn_id)
                .cloned()
                .collect())
        })
    }

    async fn create_service_gateway(
        &self,
        details: ResourceDetails,
        vcn_id: String,
        service_ids: Vec<String>,
    ) -> CloudResult<ServiceGateway> {
        self.with_state("create_service_gateway", |s| {
            let gateway = ServiceGateway {
                id: s.next_id("servicegateway"),
                display_name: details.display_name,
                vcn_id,
                service_ids,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.service_gateways.push(gateway.clone());

            Ok(gateway)
        })
    }

    async fn delete_service_gateway(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_service_gateway", |s| {
            remove(&mut s.service_gateways, "ServiceGateway", id)
        })
    }

    async fn get_network_security_group(&self, id: &str) -> CloudResult<NetworkSecurityGroup> {
        self.with_state("get_network_security_group", |s| {
            get(&s.nsgs, "NetworkSecurityGroup", id)
        })
    }

    async fn list_network_security_groups(
        &self,
        _compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<NetworkSecurityGroup>> {
        self.with_state("list_network_security_groups", |s| {
            Ok(named(&s.nsgs, display_name, |n| n.vcn_id == vcn_id))
        })
    }

    async fn create_network_security_group(
        &self,
        details: ResourceDetails,
        vcn_id: String,
    ) -> CloudResult<NetworkSecurityGroup> {
        self.with_state("create_network_security_group", |s| {
            let nsg = NetworkSecurityGroup {
                id: s.next_id("networksecuritygroup"),
                display_name: details.display_name,
                vcn_id,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.nsgs.push(nsg.clone());

            Ok(nsg)
        })
    }

    async fn update_network_security_group(
        &self,
        id: &str,
        update_details: UpdateDetails,
    ) -> CloudResult<NetworkSecurityGroup> {
        self.with_state("update_network_security_group", |s| {
            update(&mut s.nsgs, "NetworkSecurityGroup", id, |nsg| {
                nsg.display_name = update_details.display_name;
                nsg.freeform_tags = update_details.freeform_tags;
                nsg.defined_tags = update_details.defined_tags;
            })
        })
    }

    async fn delete_network_security_group(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_network_security_group", |s| {
            s.nsg_rules.retain(|(nsg, _)| nsg != id);
            remove(&mut s.nsgs, "NetworkSecurityGroup", id)
        })
    }

    async fn list_network_security_group_rules(&self, nsg_id: &str) -> CloudResult<Vec<NsgRule>> {
        self.with_state("list_network_security_group_rules", |s| {
            Ok(s.nsg_rules
                .iter()
                .filter(|(nsg, _)| nsg == nsg_id)
                .map(|(_, rule)| rule.clone())
                .collect())
        })
    }

    async fn add_network_security_group_rules(
        &self,
        nsg_id: &str,
        rules: Vec<SecurityRule>,
    ) -> CloudResult<()> {
        self.with_state("add_network_security_group_rules", |s| {
            for rule in rules {
                let id = s.next_id("securityrule");
                s.nsg_rules.push((nsg_id.to_owned(), NsgRule { id, rule }));
            }

            Ok(())
        })
    }

    async fn remove_network_security_group_rules(
        &self,
        nsg_id: &str,
        rule_ids: Vec<String>,
    ) -> CloudResult<()> {
        self.with_state("remove_network_security_group_rules", |s| {
            s.nsg_rules
                .retain(|(nsg, rule)| nsg != nsg_id || !rule_ids.contains(&rule.id));

            Ok(())
        })
    }

    async fn get_security_list(&self, id: &str) -> CloudResult<SecurityList> {
        self.with_state("get_security_list", |s| {
            get(&s.security_lists, "SecurityList", id)
        })
    }

    async fn list_security_lists(
        &self,
        _compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<SecurityList>> {
        self.with_state("list_security_lists", |s| {
            Ok(named(&s.security_lists, display_name, |l| l.vcn_id == vcn_id))
        })
    }

    async fn create_security_list(
        &self,
        details: ResourceDetails,
        vcn_id: String,
        rules: SecurityListRules,
    ) -> CloudResult<SecurityList> {
        self.with_state("create_security_list", |s| {
            let list = SecurityList {
                id: s.next_id("securitylist"),
                display_name: details.display_name,
                vcn_id,
                ingress_rules: rules.ingress_rules,
                egress_rules: rules.egress_rules,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.security_lists.push(list.clone());

            Ok(list)
        })
    }

    async fn update_security_list(
        &self,
        id: &str,
        update_details: UpdateDetails,
        rules: SecurityListRules,
    ) -> CloudResult<SecurityList> {
        self.with_state("update_security_list", |s| {
            update(&mut s.security_lists, "SecurityList", id, |list| {
                list.display_name = update_details.display_name;
                list.freeform_tags = update_details.freeform_tags;
                list.defined_tags = update_details.defined_tags;
                list.ingress_rules = rules.ingress_rules;
                list.egress_rules = rules.egress_rules;
            })
        })
    }

    async fn delete_security_list(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_security_list", |s| {
            remove(&mut s.security_lists, "SecurityList", id)
        })
    }

    async fn get_route_table(&self, id: &str) -> CloudResult<RouteTable> {
        self.with_state("get_route_table", |s| get(&s.route_tables, "RouteTable", id))
    }

    async fn list_route_tables(
        &self,
        _compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<RouteTable>> {
        self.with_state("list_route_tables", |s| {
            Ok(named(&s.route_tables, display_name, |t| t.vcn_id == vcn_id))
        })
    }

    async fn create_route_table(
        &self,
        details: ResourceDetails,
        vcn_id: String,
        route_rules: Vec<RouteRule>,
    ) -> CloudResult<RouteTable> {
        self.with_state("create_route_table", |s| {
            let table = RouteTable {
                id: s.next_id("routetable"),
                display_name: details.display_name,
                vcn_id,
                route_rules,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.route_tables.push(table.clone());

            Ok(table)
        })
    }

    async fn update_route_table(
        &self,
        id: &str,
        update_details: UpdateDetails,
        route_rules: Vec<RouteRule>,
    ) -> CloudResult<RouteTable> {
        self.with_state("update_route_table", |s| {
            update(&mut s.route_tables, "RouteTable", id, |table| {
                table.display_name = update_details.display_name;
                table.freeform_tags = update_details.freeform_tags;
                table.defined_tags = update_details.defined_tags;
                table.route_rules = route_rules;
            })
        })
    }

    async fn delete_route_table(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_route_table", |s| {
            remove(&mut s.route_tables, "RouteTable", id)
        })
    }

    async fn get_subnet(&self, id: &str) -> CloudResult<Subnet> {
        self.with_state("get_subnet", |s| get(&s.subnets, "Subnet", id))
    }

    async fn list_subnets(
        &self,
        _compartment_id: &str,
        vcn_id: &str,
        display_name: &str,
    ) -> CloudResult<Vec<Subnet>> {
        self.with_state("list_subnets", |s| {
            Ok(named(&s.subnets, display_name, |n| n.vcn_id == vcn_id))
        })
    }

    async fn create_subnet(&self, details: CreateSubnetDetails) -> CloudResult<Subnet> {
        self.with_state("create_subnet", |s| {
            let subnet = Subnet {
                id: s.next_id("subnet"),
                display_name: details.details.display_name,
                vcn_id: details.vcn_id,
                cidr_block: details.cidr_block,
                route_table_id: details.route_table_id,
                security_list_ids: details.security_list_ids,
                prohibit_public_ip_on_vnic: details.prohibit_public_ip_on_vnic,
                freeform_tags: details.details.freeform_tags,
                defined_tags: details.details.defined_tags,
            };
            s.subnets.push(subnet.clone());

            Ok(subnet)
        })
    }

    async fn update_subnet(&self, id: &str, details: UpdateSubnetDetails) -> CloudResult<Subnet> {
        self.with_state("update_subnet", |s| {
            update(&mut s.subnets, "Subnet", id, |subnet| {
                subnet.display_name = details.update.display_name;
                subnet.freeform_tags = details.update.freeform_tags;
                subnet.defined_tags = details.update.defined_tags;
                subnet.route_table_id = details.route_table_id;
                subnet.security_list_ids = details.security_list_ids;
            })
        })
    }

    async fn delete_subnet(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_subnet", |s| remove(&mut s.subnets, "Subnet", id))
    }

    async fn get_drg(&self, id: &str) -> CloudResult<Drg> {
        self.with_state("get_drg", |s| get(&s.drgs, "Drg", id))
    }

    async fn list_drgs(&self, _compartment_id: &str) -> CloudResult<Vec<Drg>> {
        self.with_state("list_drgs", |s| Ok(s.drgs.clone()))
    }

    async fn create_drg(&self, details: ResourceDetails) -> CloudResult<Drg> {
        self.with_state("create_drg", |s| {
            let drg = Drg {
                id: s.next_id("drg"),
                display_name: details.display_name,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.drgs.push(drg.clone());

            Ok(drg)
        })
    }

    async fn delete_drg(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_drg", |s| remove(&mut s.drgs, "Drg", id))
    }

    async fn get_drg_attachment(&self, id: &str) -> CloudResult<DrgAttachment> {
        self.with_state("get_drg_attachment", |s| {
            get(&s.drg_attachments, "DrgAttachment", id)
        })
    }

    async fn list_drg_attachments(
        &self,
        _compartment_id: &str,
        drg_id: &str,
        vcn_id: &str,
    ) -> CloudResult<Vec<DrgAttachment>> {
        self.with_state("list_drg_attachments", |s| {
            Ok(s.drg_attachments
                .iter()
                .filter(|a| a.drg_id == drg_id && a.vcn_id == vcn_id)
                .cloned()
                .collect())
        })
    }

    async fn create_drg_attachment(
        &self,
        details: ResourceDetails,
        drg_id: String,
        vcn_id: String,
    ) -> CloudResult<DrgAttachment> {
        self.with_state("create_drg_attachment", |s| {
            let attachment = DrgAttachment {
                id: s.next_id("drgattachment"),
                display_name: details.display_name,
                drg_id,
                vcn_id,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.drg_attachments.push(attachment.clone());

            Ok(attachment)
        })
    }

    async fn delete_drg_attachment(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_drg_attachment", |s| {
            remove(&mut s.drg_attachments, "DrgAttachment", id)
        })
    }

    async fn get_remote_peering_connection(
        &self,
        id: &str,
    ) -> CloudResult<RemotePeeringConnection> {
        self.with_state("get_remote_peering_connection", |s| {
            get(&s.remote_peering_connections, "RemotePeeringConnection", id)
        })
    }

    async fn list_remote_peering_connections(
        &self,
        _compartment_id: &str,
        drg_id: &str,
    ) -> CloudResult<Vec<RemotePeeringConnection>> {
        self.with_state("list_remote_peering_connections", |s| {
            Ok(s.remote_peering_connections
                .iter()
                .filter(|c| c.drg_id == drg_id)
                .cloned()
                .collect())
        })
    }

    async fn create_remote_peering_connection(
        &self,
        details: ResourceDetails,
        drg_id: String,
    ) -> CloudResult<RemotePeeringConnection> {
        self.with_state("create_remote_peering_connection", |s| {
            let connection = RemotePeeringConnection {
                id: s.next_id("remotepeeringconnection"),
                display_name: details.display_name,
                drg_id,
                peering_status: "NEW".to_owned(),
                peer_id: None,
                freeform_tags: details.freeform_tags,
                defined_tags: details.defined_tags,
            };
            s.remote_peering_connections.push(connection.clone());

            Ok(connection)
        })
    }

    async fn connect_remote_peering_connections(
        &self,
        id: &str,
        peer_id: &str,
        _peer_region_name: &str,
    ) -> CloudResult<()> {
        self.with_state("connect_remote_peering_connections", |s| {
            update(
                &mut s.remote_peering_connections,
                "RemotePeeringConnection",
                id,
                |connection| {
                    connection.peering_status = "PEERED".to_owned();
                    connection.peer_id = Some(peer_id.to_owned());
                },
            )
            .map(|_| ())
        })
    }

    async fn delete_remote_peering_connection(&self, id: &str) -> CloudResult<()> {
        self.with_state("delete_remote_peering_connection", |s| {
            remove(
                &mut s.remote_peering_connections,
                "RemotePeeringConnection",
                id,
            )
        })
    }
}
