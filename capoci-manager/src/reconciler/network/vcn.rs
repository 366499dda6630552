use capoci_core::{
    cloud::network::{Service, VirtualNetworkClient},
    defaults::{
        INTERNET_GATEWAY_NAME, NAT_GATEWAY_NAME, OSN_SERVICES_SUFFIX, SERVICE_GATEWAY_NAME,
        VCN_DEFAULT_CIDR,
    },
    resources::crd::v1beta1::network::{NetworkSpec, Vcn},
};
use log::info;

use crate::{
    error::ReconcilerError,
    reconciler::delete_ignoring_missing,
    scope::ClusterScope,
};

use super::{has_drifted, lookup, vcn_id};

fn vcn_name(scope: &ClusterScope) -> String {
    let name = &scope.accessor.network_spec().vcn.name;

    if name.is_empty() {
        scope.name().to_owned()
    } else {
        name.clone()
    }
}

pub(super) async fn reconcile_vcn(scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
    let network = scope.clients.network.clone();
    let name = vcn_name(scope);
    let spec = &scope.accessor.network_spec().vcn;

    let found = lookup(
        "VCN",
        scope.resource_identifier(),
        &name,
        spec.id.as_deref().map(|id| network.get_vcn(id)),
        || network.list_vcns(scope.compartment_id(), &name),
    )
    .await?
    .owned("VCN")?;

    let id = match found {
        Some(vcn) => {
            let update = scope.update_details(&name);

            if has_drifted(&vcn.display_name, &vcn.freeform_tags, &vcn.defined_tags, &update) {
                network
                    .update_vcn(&vcn.id, update)
                    .await
                    .map_err(ReconcilerError::cloud("update VCN"))?;
                info!("Updated VCN '{name}' ({})", vcn.id);
            }

            vcn.id
        }
        None => {
            let cidr = spec
                .cidr
                .clone()
                .unwrap_or_else(|| VCN_DEFAULT_CIDR.to_owned());
            let vcn = network
                .create_vcn(scope.resource_details(&name), cidr)
                .await
                .map_err(ReconcilerError::cloud("create VCN"))?;
            info!("Created VCN '{name}' ({})", vcn.id);

            vcn.id
        }
    };

    scope.accessor.network_spec_mut().vcn.id = Some(id);

    Ok(())
}

/// Id of the cluster's VCN if it still exists.
pub(super) async fn existing_vcn_id(scope: &ClusterScope) -> Result<Option<String>, ReconcilerError> {
    let network = &scope.clients.network;
    let name = vcn_name(scope);

    let found = lookup(
        "VCN",
        scope.resource_identifier(),
        &name,
        scope
            .accessor
            .network_spec()
            .vcn
            .id
            .as_deref()
            .map(|id| network.get_vcn(id)),
        || network.list_vcns(scope.compartment_id(), &name),
    )
    .await?;

    Ok(found.deletable("VCN").map(|vcn| vcn.id))
}

pub(super) async fn delete_vcn(scope: &ClusterScope) -> Result<(), ReconcilerError> {
    if let Some(id) = existing_vcn_id(scope).await? {
        delete_ignoring_missing("VCN", scope.clients.network.delete_vcn(&id)).await?;
        info!("Deleted VCN '{}' ({id})", vcn_name(scope));
    }

    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum GatewayKind {
    Internet,
    Nat,
}

impl GatewayKind {
    fn kind(self) -> &'static str {
        match self {
            GatewayKind::Internet => "internet gateway",
            GatewayKind::Nat => "NAT gateway",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            GatewayKind::Internet => INTERNET_GATEWAY_NAME,
            GatewayKind::Nat => NAT_GATEWAY_NAME,
        }
    }

    /// public subnets route through the internet gateway, private ones through the NAT
    fn is_needed(self, spec: &NetworkSpec) -> bool {
        match self {
            GatewayKind::Internet => !spec.is_all_subnets_private(),
            GatewayKind::Nat => !spec.is_all_subnets_public(),
        }
    }

    fn stored_id(self, vcn: &Vcn) -> Option<&str> {
        match self {
            GatewayKind::Internet => vcn.internet_gateway_id.as_deref(),
            GatewayKind::Nat => vcn.nat_gateway_id.as_deref(),
        }
    }

    fn store_id(self, vcn: &mut Vcn, id: String) {
        match self {
            GatewayKind::Internet => vcn.internet_gateway_id = Some(id),
            GatewayKind::Nat => vcn.nat_gateway_id = Some(id),
        }
    }
}

pub(super) async fn reconcile_gateway(
    scope: &mut ClusterScope,
    kind: GatewayKind,
) -> Result<(), ReconcilerError> {
    if !kind.is_needed(scope.accessor.network_spec()) {
        return Ok(());
    }

    let network = scope.clients.network.clone();
    let vcn_id = vcn_id(scope)?;
    let name = kind.display_name();
    let stored = kind.stored_id(&scope.accessor.network_spec().vcn);

    let found = lookup(
        kind.kind(),
        scope.resource_identifier(),
        name,
        stored.map(|id| match kind {
            GatewayKind::Internet => network.get_internet_gateway(id),
            GatewayKind::Nat => network.get_nat_gateway(id),
        }),
        || match kind {
            GatewayKind::Internet => {
                network.list_internet_gateways(scope.compartment_id(), &vcn_id, name)
            }
            GatewayKind::Nat => network.list_nat_gateways(scope.compartment_id(), &vcn_id, name),
        },
    )
    .await?
    .owned(kind.kind())?;

    let id = match found {
        Some(gateway) => gateway.id,
        None => {
            let details = scope.resource_details(name);
            let gateway = match kind {
                GatewayKind::Internet => network.create_internet_gateway(details, vcn_id).await,
                GatewayKind::Nat => network.create_nat_gateway(details, vcn_id).await,
            }
            .map_err(ReconcilerError::cloud(format!("create {}", kind.kind())))?;
            info!("Created {} '{name}' ({})", kind.kind(), gateway.id);

            gateway.id
        }
    };

    kind.store_id(&mut scope.accessor.network_spec_mut().vcn, id);

    Ok(())
}

pub(super) async fn delete_gateway(
    scope: &ClusterScope,
    vcn_id: Option<&str>,
    kind: GatewayKind,
) -> Result<(), ReconcilerError> {
    let Some(vcn_id) = vcn_id else {
        return Ok(());
    };

    let network = &scope.clients.network;
    let name = kind.display_name();
    let stored = kind.stored_id(&scope.accessor.network_spec().vcn);

    let found = lookup(
        kind.kind(),
        scope.resource_identifier(),
        name,
        stored.map(|id| match kind {
            GatewayKind::Internet => network.get_internet_gateway(id),
            GatewayKind::Nat => network.get_nat_gateway(id),
        }),
        || match kind {
            GatewayKind::Internet => {
                network.list_internet_gateways(scope.compartment_id(), vcn_id, name)
            }
            GatewayKind::Nat => network.list_nat_gateways(scope.compartment_id(), vcn_id, name),
        },
    )
    .await?
    .deletable(kind.kind());

    if let Some(gateway) = found {
        let call = match kind {
            GatewayKind::Internet => network.delete_internet_gateway(&gateway.id),
            GatewayKind::Nat => network.delete_nat_gateway(&gateway.id),
        };
        delete_ignoring_missing(kind.kind(), call).await?;
        info!("Deleted {} '{name}' ({})", kind.kind(), gateway.id);
    }

    Ok(())
}

/// The "All <region> Services In Oracle Services Network" service.
pub(super) async fn osn_service(
    network: &dyn VirtualNetworkClient,
) -> Result<Service, ReconcilerError> {
    network
        .list_services()
        .await
        .map_err(ReconcilerError::cloud("list services"))?
        .into_iter()
        .find(|service| service.cidr_block.ends_with(OSN_SERVICES_SUFFIX))
        .ok_or_else(|| ReconcilerError::MissingObjectData("Oracle Services Network service".into()))
}

pub(super) async fn reconcile_service_gateway(
    scope: &mut ClusterScope,
) -> Result<(), ReconcilerError> {
    if scope.accessor.network_spec().is_all_subnets_public() {
        return Ok(());
    }

    let network = scope.clients.network.clone();
    let vcn_id = vcn_id(scope)?;

    let found = lookup(
        "service gateway",
        scope.resource_identifier(),
        SERVICE_GATEWAY_NAME,
        scope
            .accessor
            .network_spec()
            .vcn
            .service_gateway_id
            .as_deref()
            .map(|id| network.get_service_gateway(id)),
        || network.list_service_gateways(scope.compartment_id(), &vcn_id),
    )
    .await?
    .owned("service gateway")?;

    let id = match found {
        Some(gateway) => gateway.id,
        None => {
            let service = osn_service(network.as_ref()).await?;
            let gateway = network
                .create_service_gateway(
                    scope.resource_details(SERVICE_GATEWAY_NAME),
                    vcn_id,
                    vec![service.id],
                )
                .await
                .map_err(ReconcilerError::cloud("create service gateway"))?;
            info!("Created service gateway '{SERVICE_GATEWAY_NAME}' ({})", gateway.id);

            gateway.id
        }
    };

    scope.accessor.network_spec_mut().vcn.service_gateway_id = Some(id);

    Ok(())
}

pub(super) async fn delete_service_gateway(
    scope: &ClusterScope,
    vcn_id: Option<&str>,
) -> Result<(), ReconcilerError> {
    let Some(vcn_id) = vcn_id else {
        return Ok(());
    };

    let network = &scope.clients.network;
    let found = lookup(
        "service gateway",
        scope.resource_identifier(),
        SERVICE_GATEWAY_NAME,
        scope
            .accessor
            .network_spec()
            .vcn
            .service_gateway_id
            .as_deref()
            .map(|id| network.get_service_gateway(id)),
        || network.list_service_gateways(scope.compartment_id(), vcn_id),
    )
    .await?
    .deletable("service gateway");

    if let Some(gateway) = found {
        delete_ignoring_missing(
            "service gateway",
            network.delete_service_gateway(&gateway.id),
        )
        .await?;
        info!("Deleted service gateway '{SERVICE_GATEWAY_NAME}' ({})", gateway.id);
    }

    Ok(())
}
