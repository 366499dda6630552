use capoci_core::cloud::network::{RemotePeeringConnection, VirtualNetworkClient};
use log::info;

use crate::{
    error::ReconcilerError,
    reconciler::delete_ignoring_missing,
    scope::ClusterScope,
};

use super::{lookup, vcn_id};

fn drg_id(scope: &ClusterScope) -> Option<String> {
    scope
        .accessor
        .network_spec()
        .drg()
        .and_then(|drg| drg.id.clone())
}

fn drg_name(scope: &ClusterScope) -> String {
    scope
        .accessor
        .network_spec()
        .drg()
        .and_then(|drg| drg.name.clone())
        .unwrap_or_else(|| scope.name().to_owned())
}

pub(super) async fn reconcile_drg(scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
    let Some(drg) = scope.accessor.network_spec().drg().cloned() else {
        return Ok(());
    };

    if !drg.manage {
        return match drg.id {
            Some(_) => Ok(()),
            None => Err(ReconcilerError::MissingObjectData(
                "networkSpec.vcnPeering.drg.id".into(),
            )),
        };
    }

    let network = scope.clients.network.clone();
    let name = drg_name(scope);
    let found = lookup(
        "DRG",
        scope.resource_identifier(),
        &name,
        drg.id.as_deref().map(|id| network.get_drg(id)),
        || network.list_drgs(scope.compartment_id()),
    )
    .await?
    .owned("DRG")?;

    let id = match found {
        Some(existing) => existing.id,
        None => {
            let created = network
                .create_drg(scope.resource_details(&name))
                .await
                .map_err(ReconcilerError::cloud("create DRG"))?;
            info!("Created DRG '{name}' ({})", created.id);

            created.id
        }
    };

    if let Some(drg) = scope.accessor.network_spec_mut().drg_mut() {
        drg.id = Some(id);
    }

    Ok(())
}

/// Deletes the DRG, a DRG the cluster doesn't manage is left alone.
pub(super) async fn delete_drg(scope: &ClusterScope) -> Result<(), ReconcilerError> {
    let Some(drg) = scope.accessor.network_spec().drg() else {
        return Ok(());
    };

    if !drg.manage {
        return Ok(());
    }

    let network = &scope.clients.network;
    let name = drg_name(scope);
    let found = lookup(
        "DRG",
        scope.resource_identifier(),
        &name,
        drg.id.as_deref().map(|id| network.get_drg(id)),
        || network.list_drgs(scope.compartment_id()),
    )
    .await?
    .deletable("DRG");

    if let Some(existing) = found {
        delete_ignoring_missing("DRG", network.delete_drg(&existing.id)).await?;
        info!("Deleted DRG '{name}' ({})", existing.id);
    }

    Ok(())
}

pub(super) async fn reconcile_drg_vcn_attachment(
    scope: &mut ClusterScope,
) -> Result<(), ReconcilerError> {
    let Some(drg_id) = drg_id(scope) else {
        return Ok(());
    };

    let network = scope.clients.network.clone();
    let vcn_id = vcn_id(scope)?;
    let name = scope.name().to_owned();
    let stored = scope
        .accessor
        .network_spec()
        .drg()
        .and_then(|drg| drg.vcn_attachment_id.clone());

    let found = lookup(
        "DRG attachment",
        scope.resource_identifier(),
        &name,
        stored.as_deref().map(|id| network.get_drg_attachment(id)),
        || network.list_drg_attachments(scope.compartment_id(), &drg_id, &vcn_id),
    )
    .await?
    .owned("DRG attachment")?;

    let id = match found {
        Some(existing) => existing.id,
        None => {
            let created = network
                .create_drg_attachment(scope.resource_details(&name), drg_id, vcn_id)
                .await
                .map_err(ReconcilerError::cloud("create DRG attachment"))?;
            info!("Attached VCN to DRG with '{name}' ({})", created.id);

            created.id
        }
    };

    if let Some(drg) = scope.accessor.network_spec_mut().drg_mut() {
        drg.vcn_attachment_id = Some(id);
    }

    Ok(())
}

pub(super) async fn delete_drg_vcn_attachment(
    scope: &ClusterScope,
    vcn_id: Option<&str>,
) -> Result<(), ReconcilerError> {
    let (Some(drg_id), Some(vcn_id)) = (drg_id(scope), vcn_id) else {
        return Ok(());
    };

    let network = &scope.clients.network;
    let stored = scope
        .accessor
        .network_spec()
        .drg()
        .and_then(|drg| drg.vcn_attachment_id.as_deref());

    let found = lookup(
        "DRG attachment",
        scope.resource_identifier(),
        scope.name(),
        stored.map(|id| network.get_drg_attachment(id)),
        || network.list_drg_attachments(scope.compartment_id(), &drg_id, vcn_id),
    )
    .await?
    .deletable("DRG attachment");

    if let Some(existing) = found {
        delete_ignoring_missing(
            "DRG attachment",
            network.delete_drg_attachment(&existing.id),
        )
        .await?;
        info!("Deleted DRG attachment '{}' ({})", scope.name(), existing.id);
    }

    Ok(())
}

/// Finds or creates the remote peering connection `name` in `drg_id`.
async fn ensure_connection(
    scope: &ClusterScope,
    network: &dyn VirtualNetworkClient,
    drg_id: &str,
    stored: Option<&str>,
    name: &str,
) -> Result<RemotePeeringConnection, ReconcilerError> {
    let found = lookup(
        "remote peering connection",
        scope.resource_identifier(),
        name,
        stored.map(|id| network.get_remote_peering_connection(id)),
        || network.list_remote_peering_connections(scope.compartment_id(), drg_id),
    )
    .await?
    .owned("remote peering connection")?;

    match found {
        Some(existing) => Ok(existing),
        None => {
            let created = network
                .create_remote_peering_connection(scope.resource_details(name), drg_id.to_owned())
                .await
                .map_err(ReconcilerError::cloud("create remote peering connection"))?;
            info!("Created remote peering connection '{name}' ({})", created.id);

            Ok(created)
        }
    }
}

/// Connects the DRG with the DRGs of other regions.
///
/// With `managedRemote` the peer side is created through the clients of the peer region,
/// otherwise the peer connection has to exist already.
pub(super) async fn reconcile_remote_peering_connections(
    scope: &mut ClusterScope,
) -> Result<(), ReconcilerError> {
    let Some(drg_id) = drg_id(scope) else {
        return Ok(());
    };

    let connections = scope
        .accessor
        .network_spec()
        .vcn_peering
        .as_ref()
        .map(|peering| peering.remote_peering_connections.clone())
        .unwrap_or_default();

    for (index, connection) in connections.iter().enumerate() {
        let peer_region = scope
            .resolve_region_name(&connection.peer_region_name)
            .await?;
        let local = ensure_connection(
            scope,
            scope.clients.network.as_ref(),
            &drg_id,
            connection.rpc_connection_id.as_deref(),
            &format!("{}-{peer_region}", scope.name()),
        )
        .await?;

        let peer_id = if connection.managed_remote {
            let peer_drg_id = connection.peer_drg_id.as_deref().ok_or_else(|| {
                ReconcilerError::MissingObjectData(
                    "networkSpec.vcnPeering.remotePeeringConnections.peerDrgId".into(),
                )
            })?;
            let peer_clients = scope
                .provider
                .get_or_build_client(&peer_region)
                .await
                .map_err(ReconcilerError::Client)?;
            let remote = ensure_connection(
                scope,
                peer_clients.network.as_ref(),
                peer_drg_id,
                connection.peer_rpc_connection_id.as_deref(),
                &format!("{}-{}", scope.name(), scope.region),
            )
            .await?;

            Some(remote.id)
        } else {
            connection.peer_rpc_connection_id.clone()
        };

        if let Some(peer_id) = &peer_id {
            if !local.is_peered() {
                scope
                    .clients
                    .network
                    .connect_remote_peering_connections(&local.id, peer_id, &peer_region)
                    .await
                    .map_err(ReconcilerError::cloud("connect remote peering connections"))?;
                info!("Connected remote peering connection {} with {peer_id}", local.id);
            }
        }

        if let Some(peering) = scope.accessor.network_spec_mut().vcn_peering.as_mut() {
            let stored = &mut peering.remote_peering_connections[index];
            stored.rpc_connection_id = Some(local.id);
            stored.peer_rpc_connection_id = peer_id;
        }
    }

    Ok(())
}

pub(super) async fn delete_remote_peering_connections(
    scope: &ClusterScope,
) -> Result<(), ReconcilerError> {
    let Some(drg_id) = drg_id(scope) else {
        return Ok(());
    };

    let Some(peering) = scope.accessor.network_spec().vcn_peering.as_ref() else {
        return Ok(());
    };

    for connection in &peering.remote_peering_connections {
        let peer_region = scope
            .resolve_region_name(&connection.peer_region_name)
            .await?;
        let name = format!("{}-{peer_region}", scope.name());
        delete_connection(
            scope,
            scope.clients.network.as_ref(),
            &drg_id,
            connection.rpc_connection_id.as_deref(),
            &name,
        )
        .await?;

        if connection.managed_remote {
            let Some(peer_drg_id) = connection.peer_drg_id.as_deref() else {
                continue;
            };
            let peer_clients = scope
                .provider
                .get_or_build_client(&peer_region)
                .await
                .map_err(ReconcilerError::Client)?;
            delete_connection(
                scope,
                peer_clients.network.as_ref(),
                peer_drg_id,
                connection.peer_rpc_connection_id.as_deref(),
                &format!("{}-{}", scope.name(), scope.region),
            )
            .await?;
        }
    }

    Ok(())
}

async fn delete_connection(
    scope: &ClusterScope,
    network: &dyn VirtualNetworkClient,
    drg_id: &str,
    stored: Option<&str>,
    name: &str,
) -> Result<(), ReconcilerError> {
    let found = lookup(
        "remote peering connection",
        scope.resource_identifier(),
        name,
        stored.map(|id| network.get_remote_peering_connection(id)),
        || network.list_remote_peering_connections(scope.compartment_id(), drg_id),
    )
    .await?
    .deletable("remote peering connection");

    if let Some(existing) = found {
        delete_ignoring_missing(
            "remote peering connection",
            network.delete_remote_peering_connection(&existing.id),
        )
        .await?;
        info!("Deleted remote peering connection '{name}' ({})", existing.id);
    }

    Ok(())
}
