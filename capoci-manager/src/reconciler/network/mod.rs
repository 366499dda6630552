//! Virtual network of a cluster.
//!
//! Every component is reconciled on its own, in [`NetworkComponent::CREATE_ORDER`] when the
//! cluster is created or updated and in the reverse order when it's deleted. A step always
//! re-reads the cloud state first, so repeating a pass never creates anything twice.

use capoci_core::{
    cloud::network::UpdateDetails,
    conditions::{ConditionSeverity, Conditions, CLUSTER_READY},
    tags::{DefinedTags, FreeformTags},
};
use kube::runtime::events::EventType;

use crate::{error::ReconcilerError, scope::ClusterScope};

use super::lookup;

mod peering;
mod routing;
mod security;
mod vcn;

#[cfg(test)]
pub(crate) mod fake;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkComponent {
    Drg,
    Vcn,
    InternetGateway,
    NatGateway,
    ServiceGateway,
    NetworkSecurityGroups,
    SecurityLists,
    RouteTables,
    Subnets,
    DrgVcnAttachment,
    DrgRpcAttachment,
}

impl NetworkComponent {
    pub const CREATE_ORDER: [NetworkComponent; 11] = [
        NetworkComponent::Drg,
        NetworkComponent::Vcn,
        NetworkComponent::InternetGateway,
        NetworkComponent::NatGateway,
        NetworkComponent::ServiceGateway,
        NetworkComponent::NetworkSecurityGroups,
        NetworkComponent::SecurityLists,
        NetworkComponent::RouteTables,
        NetworkComponent::Subnets,
        NetworkComponent::DrgVcnAttachment,
        NetworkComponent::DrgRpcAttachment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NetworkComponent::Drg => "DRG",
            NetworkComponent::Vcn => "VCN",
            NetworkComponent::InternetGateway => "Internet Gateway",
            NetworkComponent::NatGateway => "NAT Gateway",
            NetworkComponent::ServiceGateway => "Service Gateway",
            NetworkComponent::NetworkSecurityGroups => "Network Security Group",
            NetworkComponent::SecurityLists => "Security List",
            NetworkComponent::RouteTables => "Route Table",
            NetworkComponent::Subnets => "Subnet",
            NetworkComponent::DrgVcnAttachment => "DRGVCNAttachment",
            NetworkComponent::DrgRpcAttachment => "DRGRPCAttachment",
        }
    }

    /// reason of the `ClusterReady` condition when this component fails
    pub fn failed_reason(self) -> &'static str {
        match self {
            NetworkComponent::Drg => "DrgReconciliationFailed",
            NetworkComponent::Vcn => "VcnReconciliationFailed",
            NetworkComponent::InternetGateway => "InternetGatewayReconciliationFailed",
            NetworkComponent::NatGateway => "NatGatewayReconciliationFailed",
            NetworkComponent::ServiceGateway => "ServiceGatewayReconciliationFailed",
            NetworkComponent::NetworkSecurityGroups => "NSGReconciliationFailed",
            NetworkComponent::SecurityLists => "SecurityListReconciliationFailed",
            NetworkComponent::RouteTables => "RouteTableReconciliationFailed",
            NetworkComponent::Subnets => "SubnetReconciliationFailed",
            NetworkComponent::DrgVcnAttachment => "DRGVCNAttachmentReconciliationFailed",
            NetworkComponent::DrgRpcAttachment => "DRGRPCAttachmentReconciliationFailed",
        }
    }

    /// reason of the event published once this component is reconciled
    pub fn ready_reason(self) -> &'static str {
        match self {
            NetworkComponent::Drg => "DRGReady",
            NetworkComponent::Vcn => "VCNReady",
            NetworkComponent::InternetGateway => "InternetGatewayReady",
            NetworkComponent::NatGateway => "NATReady",
            NetworkComponent::ServiceGateway => "ServiceGatewayReady",
            NetworkComponent::NetworkSecurityGroups => "NetworkSecurityReady",
            NetworkComponent::SecurityLists => "SecurityListReady",
            NetworkComponent::RouteTables => "RouteTableReady",
            NetworkComponent::Subnets => "SubnetReady",
            NetworkComponent::DrgVcnAttachment => "DRGVCNAttachmentEventReady",
            NetworkComponent::DrgRpcAttachment => "DRGRPCAttachmentEventReady",
        }
    }

    pub async fn reconcile(self, scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
        match self {
            NetworkComponent::Drg => peering::reconcile_drg(scope).await,
            NetworkComponent::Vcn => vcn::reconcile_vcn(scope).await,
            NetworkComponent::InternetGateway => {
                vcn::reconcile_gateway(scope, vcn::GatewayKind::Internet).await
            }
            NetworkComponent::NatGateway => {
                vcn::reconcile_gateway(scope, vcn::GatewayKind::Nat).await
            }
            NetworkComponent::ServiceGateway => vcn::reconcile_service_gateway(scope).await,
            NetworkComponent::NetworkSecurityGroups => security::reconcile_nsgs(scope).await,
            NetworkComponent::SecurityLists => security::reconcile_security_lists(scope).await,
            NetworkComponent::RouteTables => routing::reconcile_route_tables(scope).await,
            NetworkComponent::Subnets => routing::reconcile_subnets(scope).await,
            NetworkComponent::DrgVcnAttachment => {
                peering::reconcile_drg_vcn_attachment(scope).await
            }
            NetworkComponent::DrgRpcAttachment => {
                peering::reconcile_remote_peering_connections(scope).await
            }
        }
    }

    /// Deletes the owned resources of this component, `vcn_id` is `None` once the VCN is gone.
    pub async fn delete(
        self,
        scope: &ClusterScope,
        vcn_id: Option<&str>,
    ) -> Result<(), ReconcilerError> {
        match self {
            NetworkComponent::Drg => peering::delete_drg(scope).await,
            NetworkComponent::Vcn => vcn::delete_vcn(scope).await,
            NetworkComponent::InternetGateway => {
                vcn::delete_gateway(scope, vcn_id, vcn::GatewayKind::Internet).await
            }
            NetworkComponent::NatGateway => {
                vcn::delete_gateway(scope, vcn_id, vcn::GatewayKind::Nat).await
            }
            NetworkComponent::ServiceGateway => vcn::delete_service_gateway(scope, vcn_id).await,
            NetworkComponent::NetworkSecurityGroups => security::delete_nsgs(scope, vcn_id).await,
            NetworkComponent::SecurityLists => {
                security::delete_security_lists(scope, vcn_id).await
            }
            NetworkComponent::RouteTables => routing::delete_route_tables(scope, vcn_id).await,
            NetworkComponent::Subnets => routing::delete_subnets(scope, vcn_id).await,
            NetworkComponent::DrgVcnAttachment => {
                peering::delete_drg_vcn_attachment(scope, vcn_id).await
            }
            NetworkComponent::DrgRpcAttachment => {
                peering::delete_remote_peering_connections(scope).await
            }
        }
    }
}

/// Reconciles every network component, stopping at the first one that fails.
pub async fn reconcile_network(scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
    for component in NetworkComponent::CREATE_ORDER {
        reconcile_component(scope, component).await?;
    }

    Ok(())
}

async fn reconcile_component(
    scope: &mut ClusterScope,
    component: NetworkComponent,
) -> Result<(), ReconcilerError> {
    match component.reconcile(scope).await {
        Ok(()) => {
            scope
                .publish(
                    EventType::Normal,
                    component.ready_reason(),
                    format!("{} is in ready state", component.name().replace(' ', "")),
                )
                .await;

            Ok(())
        }
        Err(error) => {
            scope
                .publish(
                    EventType::Warning,
                    "ReconcileError",
                    format!("failed to reconcile {}: {error}", component.name()),
                )
                .await;
            scope.accessor.status_mut().mark_false(
                CLUSTER_READY,
                component.failed_reason(),
                ConditionSeverity::Error,
                "",
            );

            Err(ReconcilerError::Component {
                component: component.name(),
                namespace: scope.namespace().to_owned(),
                name: scope.name().to_owned(),
                source: Box::new(error),
            })
        }
    }
}

/// Deletes every owned network resource, attachments first and the DRG last.
pub async fn delete_network(scope: &mut ClusterScope) -> Result<(), ReconcilerError> {
    let vcn_id = vcn::existing_vcn_id(scope).await?;

    for component in NetworkComponent::CREATE_ORDER.into_iter().rev() {
        if let Err(error) = component.delete(scope, vcn_id.as_deref()).await {
            scope
                .publish(
                    EventType::Warning,
                    "ReconcileError",
                    format!("failed to delete {}: {error}", component.name()),
                )
                .await;
            scope.accessor.status_mut().mark_false(
                CLUSTER_READY,
                component.failed_reason(),
                ConditionSeverity::Error,
                "",
            );

            return Err(ReconcilerError::ComponentDeletion {
                component: component.name(),
                namespace: scope.namespace().to_owned(),
                name: scope.name().to_owned(),
                source: Box::new(error),
            });
        }
    }

    Ok(())
}

fn vcn_id(scope: &ClusterScope) -> Result<String, ReconcilerError> {
    scope
        .accessor
        .network_spec()
        .vcn
        .id
        .clone()
        .ok_or_else(|| ReconcilerError::MissingObjectData("networkSpec.vcn.id".into()))
}

fn has_drifted(
    display_name: &str,
    freeform_tags: &FreeformTags,
    defined_tags: &DefinedTags,
    desired: &UpdateDetails,
) -> bool {
    display_name != desired.display_name
        || *freeform_tags != desired.freeform_tags
        || *defined_tags != desired.defined_tags
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use capoci_core::{
        cloud::{
            identity::{MockIdentityClient, Region},
            network::{NsgRule, SecurityRule, Vcn},
        },
        conditions::Conditions,
        defaults::apply_network_defaults,
        resources::crd::v1beta1::{
            cluster::OCICluster,
            network::{
                Drg, EndpointType, IngressSecurityRule, RemotePeeringConnection, Role,
                SubnetType, VcnPeering,
            },
        },
        tags::FreeformTags,
    };

    use crate::{
        clients::{tests::empty_bundle, ClientBundle, ClientError, ClientFactory, ClientProvider},
        events::tests::RecordingPublisher,
        scope::cluster::tests::{oci_cluster, scope_with},
        store::tests::MemoryStore,
    };

    use super::{fake::FakeNetwork, *};

    fn cluster_with_defaults() -> OCICluster {
        let mut cluster = oci_cluster();
        apply_network_defaults(&mut cluster.spec.network_spec, 6443);

        cluster
    }

    fn scope_for(
        cluster: OCICluster,
        network: Arc<FakeNetwork>,
    ) -> (ClusterScope, Arc<RecordingPublisher>) {
        let mut clients = empty_bundle();
        clients.network = network;
        let events = Arc::new(RecordingPublisher::default());
        let scope = scope_with(
            cluster.into(),
            clients,
            Arc::new(MemoryStore::default()),
            events.clone(),
        );

        (scope, events)
    }

    fn with_managed_drg(mut cluster: OCICluster) -> OCICluster {
        cluster.spec.network_spec.vcn_peering = Some(VcnPeering {
            drg: Some(Drg {
                manage: true,
                ..Default::default()
            }),
            ..Default::default()
        });

        cluster
    }

    #[tokio::test]
    async fn second_pass_creates_nothing() {
        let network = Arc::new(FakeNetwork::default());
        let (mut scope, events) = scope_for(with_managed_drg(cluster_with_defaults()), network.clone());

        reconcile_network(&mut scope).await.unwrap();
        let first_pass = network.calls();

        reconcile_network(&mut scope).await.unwrap();
        let second_pass = network.calls()[first_pass.len()..].to_vec();

        assert!(first_pass.iter().any(|c| c == "create_vcn"));
        assert_eq!(
            first_pass.iter().filter(|c| *c == "create_subnet").count(),
            4
        );
        assert!(
            second_pass
                .iter()
                .all(|c| !c.starts_with("create") && !c.starts_with("update") && !c.starts_with("add")),
            "second pass changed the network: {second_pass:?}"
        );
        assert_eq!(events.count("VCNReady"), 2);
        assert_eq!(events.count("ReconcileError"), 0);
    }

    #[tokio::test]
    async fn created_ids_are_recorded_in_the_spec() {
        let network = Arc::new(FakeNetwork::default());
        let (mut scope, _) = scope_for(cluster_with_defaults(), network.clone());

        reconcile_network(&mut scope).await.unwrap();

        let vcn = &scope.accessor.network_spec().vcn;
        assert!(vcn.id.is_some());
        assert!(vcn.internet_gateway_id.is_some());
        assert!(vcn.nat_gateway_id.is_some());
        assert!(vcn.service_gateway_id.is_some());
        assert!(vcn.private_route_table_id.is_some());
        assert!(vcn.public_route_table_id.is_some());
        assert!(vcn.subnets.iter().all(|s| s.id.is_some()));
        assert!(vcn.network_security_groups.iter().all(|n| n.id.is_some()));

        let worker = scope.accessor.subnet(Role::Worker).unwrap();
        let created = network.subnet(worker.id.as_deref().unwrap()).unwrap();
        assert!(created.prohibit_public_ip_on_vnic);
        assert_eq!(Some(created.route_table_id), vcn.private_route_table_id);
    }

    #[tokio::test]
    async fn delete_runs_in_reverse_create_order() {
        let network = Arc::new(FakeNetwork::default());
        let (mut scope, _) = scope_for(with_managed_drg(cluster_with_defaults()), network.clone());
        reconcile_network(&mut scope).await.unwrap();
        let before = network.calls().len();

        delete_network(&mut scope).await.unwrap();

        let mut deletes: Vec<String> = network.calls()[before..]
            .iter()
            .filter(|c| c.starts_with("delete"))
            .cloned()
            .collect();
        deletes.dedup();
        assert_eq!(
            deletes,
            [
                "delete_drg_attachment",
                "delete_subnet",
                "delete_route_table",
                "delete_network_security_group",
                "delete_service_gateway",
                "delete_nat_gateway",
                "delete_internet_gateway",
                "delete_vcn",
                "delete_drg",
            ]
        );
        assert!(network.is_empty());

        let before = network.calls().len();
        delete_network(&mut scope).await.unwrap();
        assert!(network.calls()[before..].iter().all(|c| !c.starts_with("delete")));
    }

    #[tokio::test]
    async fn foreign_vcn_with_the_same_name_is_not_adopted() {
        let network = Arc::new(FakeNetwork::default());
        network.insert_vcn(Vcn {
            id: "ocid1.vcn.oc1..foreign".to_owned(),
            display_name: "test".to_owned(),
            cidr_block: "10.0.0.0/16".to_owned(),
            freeform_tags: FreeformTags::from([("team".to_owned(), "other".to_owned())]),
            ..Default::default()
        });
        let (mut scope, _) = scope_for(cluster_with_defaults(), network.clone());

        NetworkComponent::Vcn.reconcile(&mut scope).await.unwrap();

        let id = scope.accessor.network_spec().vcn.id.clone().unwrap();
        assert_ne!(id, "ocid1.vcn.oc1..foreign");
        assert_eq!(network.calls(), ["list_vcns", "create_vcn"]);
    }

    #[tokio::test]
    async fn stored_id_of_a_foreign_vcn_fails_the_component() {
        let network = Arc::new(FakeNetwork::default());
        network.insert_vcn(Vcn {
            id: "ocid1.vcn.oc1..foreign".to_owned(),
            display_name: "test".to_owned(),
            ..Default::default()
        });
        let mut cluster = cluster_with_defaults();
        cluster.spec.network_spec.vcn.id = Some("ocid1.vcn.oc1..foreign".to_owned());
        let (mut scope, events) = scope_for(cluster, network.clone());

        let error = reconcile_network(&mut scope).await.unwrap_err();

        assert!(matches!(
            error,
            ReconcilerError::Component {
                component: "VCN",
                ..
            }
        ));
        assert_eq!(events.count("ReconcileError"), 1);
        assert_eq!(events.count("DRGReady"), 1);
        let condition = scope
            .accessor
            .status()
            .unwrap()
            .get_condition(CLUSTER_READY)
            .unwrap();
        assert_eq!(condition.reason.as_deref(), Some("VcnReconciliationFailed"));
        assert_eq!(condition.severity, Some(ConditionSeverity::Error));
        assert!(network.calls().iter().all(|c| !c.starts_with("create")));
    }

    #[tokio::test]
    async fn private_topology_has_no_internet_gateway() {
        let network = Arc::new(FakeNetwork::default());
        let mut cluster = cluster_with_defaults();
        for subnet in &mut cluster.spec.network_spec.vcn.subnets {
            subnet.type_ = SubnetType::Private;
        }
        let (mut scope, _) = scope_for(cluster, network.clone());

        reconcile_network(&mut scope).await.unwrap();

        let calls = network.calls();
        assert!(!calls.iter().any(|c| c == "create_internet_gateway"));
        assert_eq!(calls.iter().filter(|c| *c == "create_route_table").count(), 1);
        assert!(scope.accessor.network_spec().vcn.public_route_table_id.is_none());
    }

    #[tokio::test]
    async fn nsg_rules_reference_sibling_groups_and_drift_is_repaired() {
        let network = Arc::new(FakeNetwork::default());
        let mut cluster = cluster_with_defaults();
        let nsgs = &mut cluster.spec.network_spec.vcn.network_security_groups;
        nsgs.truncate(2);
        let sibling = nsgs[1].name.clone();
        nsgs[0].ingress_rules = vec![IngressSecurityRule {
            protocol: "6".to_owned(),
            source_type: EndpointType::NetworkSecurityGroup,
            source: sibling,
            ..Default::default()
        }];
        nsgs[0].egress_rules.clear();
        let (mut scope, _) = scope_for(cluster, network.clone());

        NetworkComponent::Vcn.reconcile(&mut scope).await.unwrap();
        NetworkComponent::NetworkSecurityGroups
            .reconcile(&mut scope)
            .await
            .unwrap();

        let spec = &scope.accessor.network_spec().vcn.network_security_groups;
        let first = spec[0].id.clone().unwrap();
        let second = spec[1].id.clone().unwrap();
        let expected = SecurityRule::Ingress(IngressSecurityRule {
            protocol: "6".to_owned(),
            source_type: EndpointType::NetworkSecurityGroup,
            source: second.clone(),
            ..Default::default()
        });
        assert_eq!(
            network.rules(&first).into_iter().map(|r| r.rule).collect::<Vec<_>>(),
            vec![expected.clone()]
        );

        network.insert_rule(
            &first,
            NsgRule {
                id: "stale".to_owned(),
                rule: SecurityRule::Ingress(IngressSecurityRule {
                    protocol: "all".to_owned(),
                    source: "0.0.0.0/0".to_owned(),
                    ..Default::default()
                }),
            },
        );
        NetworkComponent::NetworkSecurityGroups
            .reconcile(&mut scope)
            .await
            .unwrap();

        assert_eq!(
            network.rules(&first).into_iter().map(|r| r.rule).collect::<Vec<_>>(),
            vec![expected]
        );
    }

    struct PeerFactory(ClientBundle);

    #[async_trait::async_trait]
    impl ClientFactory for PeerFactory {
        async fn build(&self, _region: &str) -> Result<ClientBundle, ClientError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn managed_remote_peering_connects_both_regions() {
        let local = Arc::new(FakeNetwork::default());
        let remote = Arc::new(FakeNetwork::default());
        let mut cluster = with_managed_drg(cluster_with_defaults());
        if let Some(peering) = cluster.spec.network_spec.vcn_peering.as_mut() {
            peering.remote_peering_connections = vec![RemotePeeringConnection {
                managed_remote: true,
                peer_region_name: "IAD".to_owned(),
                peer_drg_id: Some("ocid1.drg.oc1.iad.peer".to_owned()),
                ..Default::default()
            }];
        }

        let mut identity = MockIdentityClient::new();
        identity.expect_list_regions().returning(|| {
            Ok(vec![
                Region {
                    key: "PHX".to_owned(),
                    name: "us-phoenix-1".to_owned(),
                },
                Region {
                    key: "IAD".to_owned(),
                    name: "us-ashburn-1".to_owned(),
                },
            ])
        });
        let (mut scope, _) = scope_for(cluster, local.clone());
        scope.clients.identity = Arc::new(identity);
        let mut peer_clients = empty_bundle();
        peer_clients.network = remote.clone();
        scope.provider = Arc::new(ClientProvider::new(Arc::new(PeerFactory(peer_clients))));

        reconcile_network(&mut scope).await.unwrap();

        let connection = &scope.accessor.network_spec().vcn_peering.as_ref().unwrap()
            .remote_peering_connections[0];
        let local_id = connection.rpc_connection_id.clone().unwrap();
        let remote_id = connection.peer_rpc_connection_id.clone().unwrap();
        assert!(local.remote_peering_connection(&local_id).unwrap().is_peered());
        assert_eq!(
            remote
                .remote_peering_connection(&remote_id)
                .unwrap()
                .drg_id,
            "ocid1.drg.oc1.iad.peer"
        );
        assert!(scope.provider.is_cached("us-ashburn-1").await);

        let calls = local.calls().len();
        reconcile_network(&mut scope).await.unwrap();
        assert!(!local.calls()[calls..]
            .iter()
            .any(|c| c == "connect_remote_peering_connections"));
    }
}
