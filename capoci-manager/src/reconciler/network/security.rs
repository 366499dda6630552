use std::collections::HashMap;

use capoci_core::{
    cloud::network::{SecurityListRules, SecurityRule, VirtualNetworkClient},
    resources::crd::v1beta1::network::{
        EgressSecurityRule, EndpointType, IngressSecurityRule, Nsg,
    },
};
use log::{info, warn};

use crate::{
    error::ReconcilerError,
    reconciler::delete_ignoring_missing,
    scope::ClusterScope,
};

use super::{has_drifted, lookup, vcn_id};

/// Creates the NSGs first and fills in their rules once every sibling id is known, rules may
/// reference other groups of the cluster by name.
pub(super) async fn reconcile_nsgs(scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
    let network = scope.clients.network.clone();
    let vcn_id = vcn_id(scope)?;
    let nsgs = scope
        .accessor
        .network_spec()
        .vcn
        .network_security_groups
        .clone();

    let mut ids = Vec::with_capacity(nsgs.len());
    for nsg in &nsgs {
        let found = lookup(
            "NSG",
            scope.resource_identifier(),
            &nsg.name,
            nsg.id
                .as_deref()
                .map(|id| network.get_network_security_group(id)),
            || network.list_network_security_groups(scope.compartment_id(), &vcn_id, &nsg.name),
        )
        .await?
        .owned("NSG")?;

        let id = match found {
            Some(existing) => {
                let update = scope.update_details(&nsg.name);

                if has_drifted(
                    &existing.display_name,
                    &existing.freeform_tags,
                    &existing.defined_tags,
                    &update,
                ) {
                    network
                        .update_network_security_group(&existing.id, update)
                        .await
                        .map_err(ReconcilerError::cloud("update NSG"))?;
                    info!("Updated NSG '{}' ({})", nsg.name, existing.id);
                }

                existing.id
            }
            None => {
                let created = network
                    .create_network_security_group(
                        scope.resource_details(&nsg.name),
                        vcn_id.clone(),
                    )
                    .await
                    .map_err(ReconcilerError::cloud("create NSG"))?;
                info!("Created NSG '{}' ({})", nsg.name, created.id);

                created.id
            }
        };

        ids.push(id);
    }

    for (nsg, id) in scope
        .accessor
        .network_spec_mut()
        .vcn
        .network_security_groups
        .iter_mut()
        .zip(&ids)
    {
        nsg.id = Some(id.clone());
    }

    let by_name: HashMap<&str, &str> = nsgs
        .iter()
        .zip(&ids)
        .map(|(nsg, id)| (nsg.name.as_str(), id.as_str()))
        .collect();

    for (nsg, id) in nsgs.iter().zip(&ids) {
        let desired = desired_rules(nsg, &by_name)?;
        reconcile_rules(network.as_ref(), id, desired).await?;
    }

    Ok(())
}

fn resolve_endpoint(
    nsg: &Nsg,
    type_: EndpointType,
    endpoint: &str,
    ids: &HashMap<&str, &str>,
) -> Result<String, ReconcilerError> {
    if type_ != EndpointType::NetworkSecurityGroup {
        return Ok(endpoint.to_owned());
    }

    match ids.get(endpoint) {
        Some(id) => Ok((*id).to_owned()),
        None => {
            warn!("NSG '{}' references unknown NSG '{endpoint}'!", nsg.name);
            Err(ReconcilerError::InvalidObjectData(
                format!("networkSecurityGroups.{}", nsg.name).into(),
            ))
        }
    }
}

fn desired_rules(
    nsg: &Nsg,
    ids: &HashMap<&str, &str>,
) -> Result<Vec<SecurityRule>, ReconcilerError> {
    let ingress = nsg.ingress_rules.iter().map(|rule| {
        Ok(SecurityRule::Ingress(IngressSecurityRule {
            source: resolve_endpoint(nsg, rule.source_type, &rule.source, ids)?,
            ..rule.clone()
        }))
    });
    let egress = nsg.egress_rules.iter().map(|rule| {
        Ok(SecurityRule::Egress(EgressSecurityRule {
            destination: resolve_endpoint(nsg, rule.destination_type, &rule.destination, ids)?,
            ..rule.clone()
        }))
    });

    ingress.chain(egress).collect()
}

/// Brings the rules of an NSG to exactly `desired`, untouched rules keep their ids.
async fn reconcile_rules(
    network: &dyn VirtualNetworkClient,
    nsg_id: &str,
    desired: Vec<SecurityRule>,
) -> Result<(), ReconcilerError> {
    let existing = network
        .list_network_security_group_rules(nsg_id)
        .await
        .map_err(ReconcilerError::cloud("list NSG rules"))?;

    let stale: Vec<String> = existing
        .iter()
        .filter(|current| !desired.contains(&current.rule))
        .map(|current| current.id.clone())
        .collect();
    let missing: Vec<SecurityRule> = desired
        .into_iter()
        .filter(|rule| !existing.iter().any(|current| current.rule == *rule))
        .collect();

    if !stale.is_empty() {
        let count = stale.len();
        network
            .remove_network_security_group_rules(nsg_id, stale)
            .await
            .map_err(ReconcilerError::cloud("remove NSG rules"))?;
        info!("Removed {count} stale rule(s) from NSG {nsg_id}");
    }

    if !missing.is_empty() {
        let count = missing.len();
        network
            .add_network_security_group_rules(nsg_id, missing)
            .await
            .map_err(ReconcilerError::cloud("add NSG rules"))?;
        info!("Added {count} rule(s) to NSG {nsg_id}");
    }

    Ok(())
}

pub(super) async fn delete_nsgs(
    scope: &ClusterScope,
    vcn_id: Option<&str>,
) -> Result<(), ReconcilerError> {
    let Some(vcn_id) = vcn_id else {
        return Ok(());
    };

    let network = &scope.clients.network;
    for nsg in &scope.accessor.network_spec().vcn.network_security_groups {
        let found = lookup(
            "NSG",
            scope.resource_identifier(),
            &nsg.name,
            nsg.id
                .as_deref()
                .map(|id| network.get_network_security_group(id)),
            || network.list_network_security_groups(scope.compartment_id(), vcn_id, &nsg.name),
        )
        .await?
        .deletable("NSG");

        if let Some(existing) = found {
            delete_ignoring_missing("NSG", network.delete_network_security_group(&existing.id))
                .await?;
            info!("Deleted NSG '{}' ({})", nsg.name, existing.id);
        }
    }

    Ok(())
}

pub(super) async fn reconcile_security_lists(
    scope: &mut ClusterScope,
) -> Result<(), ReconcilerError> {
    let network = scope.clients.network.clone();
    let subnets = scope.accessor.network_spec().vcn.subnets.clone();
    if subnets.iter().all(|subnet| subnet.security_list.is_none()) {
        return Ok(());
    }

    let vcn_id = vcn_id(scope)?;

    for (index, subnet) in subnets.iter().enumerate() {
        let Some(list) = &subnet.security_list else {
            continue;
        };

        let rules = SecurityListRules {
            ingress_rules: list.ingress_rules.clone(),
            egress_rules: list.egress_rules.clone(),
        };
        let found = lookup(
            "security list",
            scope.resource_identifier(),
            &list.name,
            list.id.as_deref().map(|id| network.get_security_list(id)),
            || network.list_security_lists(scope.compartment_id(), &vcn_id, &list.name),
        )
        .await?
        .owned("security list")?;

        let id = match found {
            Some(existing) => {
                let update = scope.update_details(&list.name);

                if has_drifted(
                    &existing.display_name,
                    &existing.freeform_tags,
                    &existing.defined_tags,
                    &update,
                ) || existing.ingress_rules != rules.ingress_rules
                    || existing.egress_rules != rules.egress_rules
                {
                    network
                        .update_security_list(&existing.id, update, rules)
                        .await
                        .map_err(ReconcilerError::cloud("update security list"))?;
                    info!("Updated security list '{}' ({})", list.name, existing.id);
                }

                existing.id
            }
            None => {
                let created = network
                    .create_security_list(scope.resource_details(&list.name), vcn_id.clone(), rules)
                    .await
                    .map_err(ReconcilerError::cloud("create security list"))?;
                info!("Created security list '{}' ({})", list.name, created.id);

                created.id
            }
        };

        if let Some(list) = scope.accessor.network_spec_mut().vcn.subnets[index]
            .security_list
            .as_mut()
        {
            list.id = Some(id);
        }
    }

    Ok(())
}

pub(super) async fn delete_security_lists(
    scope: &ClusterScope,
    vcn_id: Option<&str>,
) -> Result<(), ReconcilerError> {
    let Some(vcn_id) = vcn_id else {
        return Ok(());
    };

    let network = &scope.clients.network;
    let lists = scope
        .accessor
        .network_spec()
        .vcn
        .subnets
        .iter()
        .filter_map(|subnet| subnet.security_list.as_ref());

    for list in lists {
        let found = lookup(
            "security list",
            scope.resource_identifier(),
            &list.name,
            list.id.as_deref().map(|id| network.get_security_list(id)),
            || network.list_security_lists(scope.compartment_id(), vcn_id, &list.name),
        )
        .await?
        .deletable("security list");

        if let Some(existing) = found {
            delete_ignoring_missing("security list", network.delete_security_list(&existing.id))
                .await?;
            info!("Deleted security list '{}' ({})", list.name, existing.id);
        }
    }

    Ok(())
}
