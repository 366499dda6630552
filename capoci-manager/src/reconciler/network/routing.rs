use capoci_core::{
    cloud::network::{CreateSubnetDetails, RouteDestinationType, RouteRule, UpdateSubnetDetails},
    defaults::{ANYWHERE_CIDR, PRIVATE_ROUTE_TABLE_NAME, PUBLIC_ROUTE_TABLE_NAME},
    resources::crd::v1beta1::network::{NetworkSpec, Subnet, Vcn},
};
use log::info;

use crate::{
    error::ReconcilerError,
    reconciler::delete_ignoring_missing,
    scope::ClusterScope,
};

use super::{has_drifted, lookup, vcn::osn_service, vcn_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RouteTableKind {
    Private,
    Public,
}

impl RouteTableKind {
    fn display_name(self) -> &'static str {
        match self {
            RouteTableKind::Private => PRIVATE_ROUTE_TABLE_NAME,
            RouteTableKind::Public => PUBLIC_ROUTE_TABLE_NAME,
        }
    }

    fn stored_id(self, vcn: &Vcn) -> Option<&str> {
        match self {
            RouteTableKind::Private => vcn.private_route_table_id.as_deref(),
            RouteTableKind::Public => vcn.public_route_table_id.as_deref(),
        }
    }

    fn store_id(self, vcn: &mut Vcn, id: String) {
        match self {
            RouteTableKind::Private => vcn.private_route_table_id = Some(id),
            RouteTableKind::Public => vcn.public_route_table_id = Some(id),
        }
    }

    fn is_needed(self, spec: &NetworkSpec) -> bool {
        match self {
            RouteTableKind::Private => !spec.is_all_subnets_public(),
            RouteTableKind::Public => !spec.is_all_subnets_private(),
        }
    }

    fn of(subnet: &Subnet) -> Self {
        if subnet.is_private() {
            RouteTableKind::Private
        } else {
            RouteTableKind::Public
        }
    }
}

fn missing(field: &'static str) -> ReconcilerError {
    ReconcilerError::MissingObjectData(field.into())
}

/// routes to peered networks through the DRG, empty until the DRG is known
fn peer_route_rules(spec: &NetworkSpec) -> Vec<RouteRule> {
    let Some(drg_id) = spec.drg().and_then(|drg| drg.id.as_deref()) else {
        return Vec::new();
    };

    spec.vcn_peering
        .iter()
        .flat_map(|peering| &peering.peer_route_rules)
        .map(|rule| RouteRule {
            destination: rule.vcn_cidr_range.clone(),
            destination_type: RouteDestinationType::CidrBlock,
            network_entity_id: drg_id.to_owned(),
            description: Some("traffic to peered VCN".to_owned()),
        })
        .collect()
}

async fn desired_route_rules(
    scope: &ClusterScope,
    kind: RouteTableKind,
) -> Result<Vec<RouteRule>, ReconcilerError> {
    let spec = scope.accessor.network_spec();

    let mut rules = match kind {
        RouteTableKind::Private => {
            let nat_gateway_id = spec
                .vcn
                .nat_gateway_id
                .clone()
                .ok_or_else(|| missing("networkSpec.vcn.natGatewayId"))?;
            let service_gateway_id = spec
                .vcn
                .service_gateway_id
                .clone()
                .ok_or_else(|| missing("networkSpec.vcn.serviceGatewayId"))?;
            let service = osn_service(scope.clients.network.as_ref()).await?;

            vec![
                RouteRule {
                    destination: ANYWHERE_CIDR.to_owned(),
                    destination_type: RouteDestinationType::CidrBlock,
                    network_entity_id: nat_gateway_id,
                    description: Some("traffic to the internet".to_owned()),
                },
                RouteRule {
                    destination: service.cidr_block,
                    destination_type: RouteDestinationType::ServiceCidrBlock,
                    network_entity_id: service_gateway_id,
                    description: Some("traffic to OCI services".to_owned()),
                },
            ]
        }
        RouteTableKind::Public => {
            let internet_gateway_id = spec
                .vcn
                .internet_gateway_id
                .clone()
                .ok_or_else(|| missing("networkSpec.vcn.internetGatewayId"))?;

            vec![RouteRule {
                destination: ANYWHERE_CIDR.to_owned(),
                destination_type: RouteDestinationType::CidrBlock,
                network_entity_id: internet_gateway_id,
                description: Some("traffic to/from internet".to_owned()),
            }]
        }
    };
    rules.extend(peer_route_rules(spec));

    Ok(rules)
}

pub(super) async fn reconcile_route_tables(
    scope: &mut ClusterScope,
) -> Result<(), ReconcilerError> {
    let network = scope.clients.network.clone();
    let vcn_id = vcn_id(scope)?;

    for kind in [RouteTableKind::Private, RouteTableKind::Public] {
        if !kind.is_needed(scope.accessor.network_spec()) {
            continue;
        }

        let rules = desired_route_rules(scope, kind).await?;
        let name = kind.display_name();
        let found = lookup(
            "route table",
            scope.resource_identifier(),
            name,
            kind.stored_id(&scope.accessor.network_spec().vcn)
                .map(|id| network.get_route_table(id)),
            || network.list_route_tables(scope.compartment_id(), &vcn_id, name),
        )
        .await?
        .owned("route table")?;

        let id = match found {
            Some(existing) => {
                let update = scope.update_details(name);

                if has_drifted(
                    &existing.display_name,
                    &existing.freeform_tags,
                    &existing.defined_tags,
                    &update,
                ) || existing.route_rules != rules
                {
                    network
                        .update_route_table(&existing.id, update, rules)
                        .await
                        .map_err(ReconcilerError::cloud("update route table"))?;
                    info!("Updated route table '{name}' ({})", existing.id);
                }

                existing.id
            }
            None => {
                let created = network
                    .create_route_table(scope.resource_details(name), vcn_id.clone(), rules)
                    .await
                    .map_err(ReconcilerError::cloud("create route table"))?;
                info!("Created route table '{name}' ({})", created.id);

                created.id
            }
        };

        kind.store_id(&mut scope.accessor.network_spec_mut().vcn, id);
    }

    Ok(())
}

pub(super) async fn delete_route_tables(
    scope: &ClusterScope,
    vcn_id: Option<&str>,
) -> Result<(), ReconcilerError> {
    let Some(vcn_id) = vcn_id else {
        return Ok(());
    };

    let network = &scope.clients.network;
    for kind in [RouteTableKind::Private, RouteTableKind::Public] {
        let name = kind.display_name();
        let found = lookup(
            "route table",
            scope.resource_identifier(),
            name,
            kind.stored_id(&scope.accessor.network_spec().vcn)
                .map(|id| network.get_route_table(id)),
            || network.list_route_tables(scope.compartment_id(), vcn_id, name),
        )
        .await?
        .deletable("route table");

        if let Some(existing) = found {
            delete_ignoring_missing("route table", network.delete_route_table(&existing.id))
                .await?;
            info!("Deleted route table '{name}' ({})", existing.id);
        }
    }

    Ok(())
}

pub(super) async fn reconcile_subnets(scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
    let network = scope.clients.network.clone();
    let vcn_id = vcn_id(scope)?;
    let subnets = scope.accessor.network_spec().vcn.subnets.clone();

    for (index, subnet) in subnets.iter().enumerate() {
        let route_table_id = RouteTableKind::of(subnet)
            .stored_id(&scope.accessor.network_spec().vcn)
            .map(str::to_owned)
            .ok_or_else(|| missing("networkSpec.vcn.routeTableId"))?;
        let security_list_ids: Vec<String> = subnet
            .security_list
            .as_ref()
            .and_then(|list| list.id.clone())
            .into_iter()
            .collect();

        let found = lookup(
            "subnet",
            scope.resource_identifier(),
            &subnet.name,
            subnet.id.as_deref().map(|id| network.get_subnet(id)),
            || network.list_subnets(scope.compartment_id(), &vcn_id, &subnet.name),
        )
        .await?
        .owned("subnet")?;

        let id = match found {
            Some(existing) => {
                let update = scope.update_details(&subnet.name);
                // without a list of its own the subnet keeps the VCN's default security list
                let lists_drifted = !security_list_ids.is_empty()
                    && existing.security_list_ids != security_list_ids;

                if has_drifted(
                    &existing.display_name,
                    &existing.freeform_tags,
                    &existing.defined_tags,
                    &update,
                ) || existing.route_table_id != route_table_id
                    || lists_drifted
                {
                    network
                        .update_subnet(
                            &existing.id,
                            UpdateSubnetDetails {
                                update,
                                route_table_id,
                                security_list_ids,
                            },
                        )
                        .await
                        .map_err(ReconcilerError::cloud("update subnet"))?;
                    info!("Updated subnet '{}' ({})", subnet.name, existing.id);
                }

                existing.id
            }
            None => {
                let created = network
                    .create_subnet(CreateSubnetDetails {
                        details: scope.resource_details(&subnet.name),
                        vcn_id: vcn_id.clone(),
                        cidr_block: subnet.cidr.clone(),
                        route_table_id,
                        security_list_ids,
                        prohibit_public_ip_on_vnic: subnet.is_private(),
                    })
                    .await
                    .map_err(ReconcilerError::cloud("create subnet"))?;
                info!("Created subnet '{}' ({})", subnet.name, created.id);

                created.id
            }
        };

        scope.accessor.network_spec_mut().vcn.subnets[index].id = Some(id);
    }

    Ok(())
}

pub(super) async fn delete_subnets(
    scope: &ClusterScope,
    vcn_id: Option<&str>,
) -> Result<(), ReconcilerError> {
    let Some(vcn_id) = vcn_id else {
        return Ok(());
    };

    let network = &scope.clients.network;
    for subnet in &scope.accessor.network_spec().vcn.subnets {
        let found = lookup(
            "subnet",
            scope.resource_identifier(),
            &subnet.name,
            subnet.id.as_deref().map(|id| network.get_subnet(id)),
            || network.list_subnets(scope.compartment_id(), vcn_id, &subnet.name),
        )
        .await?
        .deletable("subnet");

        if let Some(existing) = found {
            delete_ignoring_missing("subnet", network.delete_subnet(&existing.id)).await?;
            info!("Deleted subnet '{}' ({})", subnet.name, existing.id);
        }
    }

    Ok(())
}
